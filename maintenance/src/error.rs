//! Errors raised before any remote call is made.

/// Invalid caller input. Always reported before touching the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Batch size {batch_size} exceeds the {backend} limit of {cap} per call")]
    BatchSizeOverCap {
        backend: String,
        batch_size: usize,
        cap: usize,
    },

    #[error("Page size must be at least 1")]
    ZeroPageSize,

    #[error("Initial backoff must be greater than zero")]
    ZeroBackoff,

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
