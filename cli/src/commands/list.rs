//! List items command.

use std::sync::Arc;

use anyhow::Result;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::instrument;
use wellspring_maintenance::bulk::{BulkMutator, MutatorConfig};
use wellspring_maintenance::collection::RemoteCollection;
use wellspring_maintenance::config::Config;

use super::{build_filter, cloudinary, r2, target_label};
use crate::cli::{Backend, Target};
use crate::output::{Output, TerminalProgress, format_size};

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Size")]
    size: String,
}

#[instrument(skip_all, name = "list", fields(target = %target_label(&target)))]
pub async fn run_list(config: &Config, target: Target, page_size: Option<usize>) -> Result<()> {
    let mut mutator_config = config.mutator();
    if let Some(page_size) = page_size {
        mutator_config.page_size = page_size;
    }

    match target.backend {
        Backend::Cloudinary => list(cloudinary(config)?, mutator_config, &target).await,
        Backend::R2 => list(r2(config)?, mutator_config, &target).await,
    }
}

async fn list<C: RemoteCollection>(
    collection: C,
    mutator_config: MutatorConfig,
    target: &Target,
) -> Result<()> {
    let out = Output::new();
    let mutator = BulkMutator::new(collection, mutator_config)
        .with_progress(Arc::new(TerminalProgress::new(out.clone())));
    let filter = build_filter(target);

    let enumeration = mutator
        .enumerate_all(&target.prefix, filter.as_deref())
        .await?;

    if enumeration.is_empty() {
        out.dim("No items found.");
    } else {
        let rows: Vec<ItemRow> = enumeration
            .items
            .iter()
            .map(|item| ItemRow {
                identifier: item.identifier.clone(),
                size: item.size_bytes.map(format_size).unwrap_or_default(),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::rounded());
        out.newline();
        out.print(table.to_string());
        out.labeled_indent("Total", format!("{} item(s)", enumeration.len()), 0);
        out.labeled_indent("Size", format_size(enumeration.total_bytes()), 0);
    }

    if !enumeration.complete() {
        anyhow::bail!(
            "Listing of {} is incomplete ({}); {} item(s) shown",
            target_label(target),
            enumeration.status,
            enumeration.len()
        );
    }
    Ok(())
}
