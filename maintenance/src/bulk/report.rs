//! Outcomes of enumeration and batched deletion.

use std::fmt;

use crate::collection::RemoteItem;
use crate::error::ConfigurationError;

/// How an enumeration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumerationStatus {
    /// The last page had no cursor.
    Complete,
    /// Fetching `page` (1-based) failed; earlier pages are kept.
    Failed { page: usize, message: String },
    /// Cancelled before fetching `next_page`.
    Cancelled { next_page: usize },
}

impl fmt::Display for EnumerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumerationStatus::Complete => write!(f, "complete"),
            EnumerationStatus::Failed { page, message } => {
                write!(f, "stopped at page {page}: {message}")
            }
            EnumerationStatus::Cancelled { next_page } => {
                write!(f, "cancelled before page {next_page}")
            }
        }
    }
}

/// Everything an enumeration gathered, and whether it saw the whole collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub items: Vec<RemoteItem>,
    pub pages_fetched: usize,
    pub status: EnumerationStatus,
}

impl Enumeration {
    /// `false` when a page failed or the run was cancelled. Acting on an
    /// incomplete set may leave items behind.
    pub fn complete(&self) -> bool {
        matches!(self.status, EnumerationStatus::Complete)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().filter_map(|item| item.size_bytes).sum()
    }
}

/// What happens to the remaining batches once one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchFailurePolicy {
    /// Record the failure and go on with the next batch.
    #[default]
    Continue,
    /// Record the failure and issue no further batches.
    Abort,
}

/// A batch whose delete call failed. Failed batches are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// 1-based batch number.
    pub batch: usize,
    pub size: usize,
    pub first_identifier: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub total_requested: usize,
    pub total_deleted: usize,
    /// True only if every batch was issued and succeeded.
    pub success: bool,
    pub batches_issued: usize,
    pub failures: Vec<BatchFailure>,
    pub cancelled: bool,
    /// A failure stopped the run under [`BatchFailurePolicy::Abort`].
    pub aborted: bool,
}

impl MutationReport {
    pub(crate) fn new(total_requested: usize) -> Self {
        Self {
            total_requested,
            total_deleted: 0,
            success: true,
            batches_issued: 0,
            failures: Vec::new(),
            cancelled: false,
            aborted: false,
        }
    }

    pub fn total_failed(&self) -> usize {
        self.failures.iter().map(|f| f.size).sum()
    }

    /// Items never submitted because the run was cancelled or aborted.
    pub fn total_skipped(&self) -> usize {
        self.total_requested
            .saturating_sub(self.total_deleted)
            .saturating_sub(self.total_failed())
    }
}

/// Why a destructive run refused to start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Deletion was not confirmed")]
    NotConfirmed,

    #[error("Listing is incomplete ({status}); refusing to delete {found} item(s)")]
    IncompleteEnumeration {
        found: usize,
        status: EnumerationStatus,
    },
}

/// Result of a full enumerate-then-delete run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub enumeration: Enumeration,
    pub report: MutationReport,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.enumeration.complete() && self.report.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = MutationReport::new(10);
        report.total_deleted = 4;
        report.failures.push(BatchFailure {
            batch: 2,
            size: 3,
            first_identifier: "a".to_owned(),
            message: "boom".to_owned(),
        });
        assert_eq!(report.total_failed(), 3);
        assert_eq!(report.total_skipped(), 3);
    }

    #[test]
    fn test_enumeration_complete_flag() {
        let enumeration = Enumeration {
            items: vec![RemoteItem::keyed("a").with_size(10), RemoteItem::keyed("b")],
            pages_fetched: 2,
            status: EnumerationStatus::Failed {
                page: 3,
                message: "timeout".to_owned(),
            },
        };
        assert!(!enumeration.complete());
        assert_eq!(enumeration.len(), 2);
        assert_eq!(enumeration.total_bytes(), 10);
        assert_eq!(enumeration.status.to_string(), "stopped at page 3: timeout");
    }
}
