//! Bulk delete command.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use wellspring_maintenance::bulk::{
    BatchFailurePolicy, BulkMutator, Enumeration, MutationError, MutationReport, MutatorConfig,
};
use wellspring_maintenance::collection::RemoteCollection;
use wellspring_maintenance::config::Config;

use super::{build_filter, cancel_on_ctrl_c, cloudinary, r2, target_label};
use crate::cli::{Backend, Target};
use crate::confirm::confirm_deletion;
use crate::output::{Output, TerminalProgress, format_size};

/// Flags of `wellspring clear` beyond the target.
#[derive(Debug, Clone, Copy)]
pub struct ClearOptions {
    pub batch_size: Option<usize>,
    pub yes: bool,
    pub abort_on_failure: bool,
    pub allow_partial: bool,
}

#[instrument(skip_all, name = "clear", fields(target = %target_label(&target)))]
pub async fn run_clear(config: &Config, target: Target, options: ClearOptions) -> Result<()> {
    let mut mutator_config = config.mutator();
    if let Some(batch_size) = options.batch_size {
        mutator_config.batch_size = batch_size;
    }
    if options.abort_on_failure {
        mutator_config.on_batch_failure = BatchFailurePolicy::Abort;
    }

    match target.backend {
        Backend::Cloudinary => {
            clear(cloudinary(config)?, mutator_config, &target, options).await
        }
        Backend::R2 => clear(r2(config)?, mutator_config, &target, options).await,
    }
}

async fn clear<C: RemoteCollection>(
    collection: C,
    mutator_config: MutatorConfig,
    target: &Target,
    options: ClearOptions,
) -> Result<()> {
    let out = Output::new();
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mutator = BulkMutator::new(collection, mutator_config)
        .with_progress(Arc::new(TerminalProgress::new(out.clone())))
        .with_cancellation(cancel);

    let filter = build_filter(target);
    let label = target_label(target);

    let enumeration = match mutator
        .enumerate_for_deletion(&target.prefix, filter.as_deref(), options.allow_partial)
        .await
    {
        Ok(enumeration) => enumeration,
        Err(e @ MutationError::IncompleteEnumeration { .. }) => {
            anyhow::bail!("{label}: {e}. Re-run with --allow-partial to delete them anyway")
        }
        Err(e) => return Err(e.into()),
    };

    if !enumeration.complete() {
        out.warning(format!(
            "Listing is incomplete ({}); continuing with {} item(s)",
            enumeration.status,
            enumeration.len()
        ));
    }

    if enumeration.is_empty() {
        out.success(format!("Nothing to delete under {label}"));
        return Ok(());
    }

    out.info(format!(
        "Found {} item(s) ({}) under {label}",
        enumeration.len(),
        format_size(enumeration.total_bytes())
    ));

    // A denied confirmation is refused inside the mutator.
    let confirmation = confirm_deletion(enumeration.len(), &label, options.yes)?;
    let report = mutator
        .mutate_in_batches(&enumeration.items, mutator_config.batch_size, confirmation)
        .await?;
    info!(
        deleted = report.total_deleted,
        failed = report.total_failed(),
        "Clear finished"
    );

    print_summary(&out, &report);
    check_outcome(&report, &enumeration, &label)
}

/// A run only succeeds when every batch went through and the listing saw
/// the whole target.
fn check_outcome(report: &MutationReport, enumeration: &Enumeration, label: &str) -> Result<()> {
    if !report.success {
        anyhow::bail!(
            "{} of {} item(s) under {label} were not deleted",
            report.total_requested - report.total_deleted,
            report.total_requested
        );
    }
    if !enumeration.complete() {
        anyhow::bail!(
            "Deleted all {} listed item(s), but the listing of {label} was incomplete ({}); \
             more items may remain",
            report.total_deleted,
            enumeration.status
        );
    }
    Ok(())
}

fn print_summary(out: &Output, report: &MutationReport) {
    out.newline();
    out.header("Summary");
    out.labeled_indent("Deleted", report.total_deleted, 2);
    out.labeled_indent("Failed", report.total_failed(), 2);
    out.labeled_indent("Skipped", report.total_skipped(), 2);
    out.labeled_indent("Batches", report.batches_issued, 2);

    for failure in &report.failures {
        out.error(format!(
            "Batch {} ({} items from {}): {}",
            failure.batch, failure.size, failure.first_identifier, failure.message
        ));
    }
    if report.cancelled {
        out.warning("Interrupted; remaining batches were not sent.");
    } else if report.aborted {
        out.warning("Stopped after the first failed batch.");
    } else if report.success {
        out.success(format!("Deleted all {} item(s)", report.total_deleted));
    }
}
