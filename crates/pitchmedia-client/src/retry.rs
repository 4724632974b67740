//! Retry policy for destination-scoped uploads.
//!
//! One policy value is shared by the thumbnail and video uploads: max
//! attempts, exponential backoff, and the retryable-error predicate.

use std::time::Duration;

use crate::transport::TransferError;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries permitted after the first attempt. `max_retries = N` allows
    /// `N + 1` total attempts.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff after failed attempt `attempt` (0-based): base * 2^attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.min(16))
    }

    /// Whether failed attempt `attempt` (0-based) may be retried.
    pub fn should_retry(&self, error: &TransferError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }
}
