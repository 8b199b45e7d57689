//! Paginated enumeration and batched deletion over a [`RemoteCollection`].
//!
//! [`RemoteCollection`]: crate::collection::RemoteCollection

mod confirm;
mod filter;
mod mutator;
mod progress;
mod report;

pub use confirm::Confirmation;
pub use filter::{direct_children, under_prefix};
pub use mutator::{
    BulkMutator, DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, ItemFilter, MutatorConfig, MutatorPhase,
};
pub use progress::{ProgressEvent, ProgressSink, RecordingProgress, TracingProgress};
pub use report::{
    BatchFailure, BatchFailurePolicy, Enumeration, EnumerationStatus, MutationError,
    MutationReport, RunOutcome,
};
