//! Enumerate a remote collection page by page, then delete in batches.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::confirm::Confirmation;
use super::progress::{ProgressEvent, ProgressSink, TracingProgress};
use super::report::{
    BatchFailure, BatchFailurePolicy, Enumeration, EnumerationStatus, MutationError,
    MutationReport, RunOutcome,
};
use crate::collection::{Page, PageRequest, RemoteCollection, RemoteItem};
use crate::error::ConfigurationError;

/// Client-side predicate applied to every enumerated item.
pub type ItemFilter<'a> = &'a (dyn Fn(&RemoteItem) -> bool + Send + Sync);

pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Settings for one [`BulkMutator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutatorConfig {
    /// Page-size hint passed to every listing call.
    pub page_size: usize,
    pub batch_size: usize,
    pub on_batch_failure: BatchFailurePolicy,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            on_batch_failure: BatchFailurePolicy::Continue,
        }
    }
}

/// Lifecycle of one run. Phases only move forward; a mutator starts `Idle`
/// and each later phase is announced through [`ProgressEvent::PhaseEntered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatorPhase {
    Idle,
    Enumerating,
    Mutating,
    Done,
}

impl fmt::Display for MutatorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutatorPhase::Idle => write!(f, "idle"),
            MutatorPhase::Enumerating => write!(f, "enumerating"),
            MutatorPhase::Mutating => write!(f, "mutating"),
            MutatorPhase::Done => write!(f, "done"),
        }
    }
}

/// Drives a [`RemoteCollection`] through enumeration and batched deletion.
///
/// Calls are issued one at a time, in enumeration order. Cancellation is
/// checked before every page and every batch; deletions already applied stay
/// applied.
pub struct BulkMutator<C> {
    collection: C,
    config: MutatorConfig,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl<C: RemoteCollection> BulkMutator<C> {
    pub fn new(collection: C, config: MutatorConfig) -> Self {
        Self {
            collection,
            config,
            progress: Arc::new(TracingProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn enter(&self, phase: MutatorPhase) {
        self.progress.on_progress(&ProgressEvent::PhaseEntered(phase));
    }

    /// Check a batch size against the backend's hard cap.
    pub fn validate_batch_size(&self, batch_size: usize) -> Result<(), ConfigurationError> {
        let cap = self.collection.max_batch_size();
        if batch_size == 0 {
            return Err(ConfigurationError::ZeroBatchSize);
        }
        if batch_size > cap {
            return Err(ConfigurationError::BatchSizeOverCap {
                backend: self.collection.name().to_owned(),
                batch_size,
                cap,
            });
        }
        Ok(())
    }

    /// Follow cursors from the first page until none is returned.
    ///
    /// Only a zero page size is an error, raised before the first fetch. A
    /// failing page never surfaces as an error: the items gathered so far are
    /// returned and the result is marked incomplete.
    #[instrument(skip_all, fields(backend = self.collection.name(), prefix = %prefix))]
    pub async fn enumerate_all(
        &self,
        prefix: &str,
        filter: Option<ItemFilter<'_>>,
    ) -> Result<Enumeration, ConfigurationError> {
        if self.config.page_size == 0 {
            return Err(ConfigurationError::ZeroPageSize);
        }
        self.enter(MutatorPhase::Enumerating);

        let mut request = PageRequest::first(prefix, self.config.page_size);
        let mut items = Vec::new();
        let mut pages_fetched = 0;

        loop {
            let page_number = pages_fetched + 1;

            if self.cancel.is_cancelled() {
                warn!(page = page_number, "Enumeration cancelled");
                return Ok(Enumeration {
                    items,
                    pages_fetched,
                    status: EnumerationStatus::Cancelled {
                        next_page: page_number,
                    },
                });
            }

            let Page {
                items: page_items,
                next_cursor,
            } = match self.collection.fetch_page(&request).await {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        page = page_number,
                        kept = items.len(),
                        error = %e,
                        "Page fetch failed, returning partial enumeration"
                    );
                    return Ok(Enumeration {
                        items,
                        pages_fetched,
                        status: EnumerationStatus::Failed {
                            page: page_number,
                            message: e.to_string(),
                        },
                    });
                }
            };
            pages_fetched = page_number;

            let fetched = page_items.len();
            items.extend(
                page_items
                    .into_iter()
                    .filter(|item| filter.is_none_or(|keep| keep(item))),
            );
            debug!(page = page_number, fetched, matched = items.len(), "Page received");
            self.progress.on_progress(&ProgressEvent::PageFetched {
                page: page_number,
                matched_so_far: items.len(),
            });

            match next_cursor {
                Some(cursor) => request = request.next(cursor),
                None => break,
            }
        }

        info!(pages = pages_fetched, items = items.len(), "Enumeration complete");
        Ok(Enumeration {
            items,
            pages_fetched,
            status: EnumerationStatus::Complete,
        })
    }

    /// Delete `items` in consecutive chunks of at most `batch_size`.
    ///
    /// Fails before any remote call if the batch size is out of range or the
    /// run was not confirmed. A failed chunk is recorded and never retried;
    /// whether later chunks still run is decided by
    /// [`MutatorConfig::on_batch_failure`].
    #[instrument(
        skip_all,
        fields(backend = self.collection.name(), total = items.len(), batch_size = batch_size)
    )]
    pub async fn mutate_in_batches(
        &self,
        items: &[RemoteItem],
        batch_size: usize,
        confirmation: Confirmation,
    ) -> Result<MutationReport, MutationError> {
        self.validate_batch_size(batch_size)?;
        if !confirmation.is_granted() {
            return Err(MutationError::NotConfirmed);
        }

        self.enter(MutatorPhase::Mutating);
        let total = items.len();
        let mut report = MutationReport::new(total);

        for (index, chunk) in items.chunks(batch_size).enumerate() {
            let batch = index + 1;

            if self.cancel.is_cancelled() {
                warn!(batch, deleted = report.total_deleted, "Deletion cancelled");
                report.cancelled = true;
                break;
            }

            let identifiers: Vec<String> =
                chunk.iter().map(|item| item.identifier.clone()).collect();
            report.batches_issued += 1;

            match self.collection.delete_batch(&identifiers).await {
                Ok(()) => {
                    report.total_deleted += identifiers.len();
                    self.progress.on_progress(&ProgressEvent::BatchDeleted {
                        deleted_so_far: report.total_deleted,
                        total,
                    });
                }
                Err(e) => {
                    let failure = BatchFailure {
                        batch,
                        size: identifiers.len(),
                        first_identifier: identifiers.first().cloned().unwrap_or_default(),
                        message: e.to_string(),
                    };
                    self.progress.on_progress(&ProgressEvent::BatchFailed {
                        batch,
                        size: failure.size,
                        message: failure.message.clone(),
                    });
                    report.failures.push(failure);

                    if self.config.on_batch_failure == BatchFailurePolicy::Abort {
                        warn!(batch, "Aborting remaining batches after failure");
                        report.aborted = true;
                        break;
                    }
                }
            }
        }

        report.success = report.failures.is_empty() && !report.cancelled;
        info!(
            deleted = report.total_deleted,
            failed = report.total_failed(),
            skipped = report.total_skipped(),
            success = report.success,
            "Batched deletion finished"
        );
        self.enter(MutatorPhase::Done);
        Ok(report)
    }

    /// Everything under `prefix` that passes `filter`, checked for deletion.
    ///
    /// Settings are validated before the first fetch. An incomplete
    /// enumeration is refused unless `allow_partial` is set, and a refusal
    /// ends the run.
    pub async fn enumerate_for_deletion(
        &self,
        prefix: &str,
        filter: Option<ItemFilter<'_>>,
        allow_partial: bool,
    ) -> Result<Enumeration, MutationError> {
        self.validate_batch_size(self.config.batch_size)?;

        let enumeration = self.enumerate_all(prefix, filter).await?;
        if !enumeration.complete() && !allow_partial {
            self.enter(MutatorPhase::Done);
            return Err(MutationError::IncompleteEnumeration {
                found: enumeration.len(),
                status: enumeration.status,
            });
        }
        Ok(enumeration)
    }

    /// Enumerate under `prefix` and delete everything that passes `filter`.
    ///
    /// The confirmation is checked before any remote call.
    pub async fn run(
        &self,
        prefix: &str,
        filter: Option<ItemFilter<'_>>,
        confirmation: Confirmation,
        allow_partial: bool,
    ) -> Result<RunOutcome, MutationError> {
        if !confirmation.is_granted() {
            return Err(MutationError::NotConfirmed);
        }

        let enumeration = self
            .enumerate_for_deletion(prefix, filter, allow_partial)
            .await?;
        let report = self
            .mutate_in_batches(&enumeration.items, self.config.batch_size, confirmation)
            .await?;

        Ok(RunOutcome {
            enumeration,
            report,
        })
    }
}
