//! Progress reporting for bulk runs.

use tracing::{debug, error, info};

use super::mutator::MutatorPhase;

/// Something worth telling an operator while a bulk run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The mutator moved to a later phase.
    PhaseEntered(MutatorPhase),
    /// A listing page arrived.
    PageFetched { page: usize, matched_so_far: usize },
    /// A delete batch completed.
    BatchDeleted { deleted_so_far: usize, total: usize },
    /// A delete batch failed and was not retried.
    BatchFailed {
        batch: usize,
        size: usize,
        message: String,
    },
}

/// Receiver of [`ProgressEvent`]s.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Default sink: every event becomes a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseEntered(phase) => debug!(%phase, "Entered phase"),
            ProgressEvent::PageFetched {
                page,
                matched_so_far,
            } => info!(page, matched_so_far, "Fetched page"),
            ProgressEvent::BatchDeleted {
                deleted_so_far,
                total,
            } => info!("Deleted {deleted_so_far} of {total}"),
            ProgressEvent::BatchFailed {
                batch,
                size,
                message,
            } => error!(batch, size, %message, "Batch delete failed"),
        }
    }
}

/// Sink that keeps every event, for tests and summaries.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().expect("lock poisoned").push(event.clone());
    }
}
