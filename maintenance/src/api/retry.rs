use std::time::Duration;

use crate::error::ConfigurationError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded exponential backoff.
///
/// The first attempt is never delayed; retry `n` (0-based) waits
/// `initial_backoff * 2^n`, capped at `max_backoff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff: DEFAULT_MAX_BACKOFF.max(initial_backoff),
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.initial_backoff.is_zero() {
            return Err(ConfigurationError::ZeroBackoff);
        }
        if self.max_backoff < self.initial_backoff {
            return Err(ConfigurationError::Invalid {
                name: "max_backoff",
                reason: "must not be shorter than the initial backoff".to_owned(),
            });
        }
        Ok(())
    }
}
