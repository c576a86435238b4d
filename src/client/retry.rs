//! Retry policy for API requests.

use std::time::Duration;

/// Exponential backoff between a minimum and maximum wait.
///
/// `max_attempts` counts the first try, so `1` disables retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub wait_min: Duration,
    /// Upper bound for any single wait.
    pub wait_max: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub fn new(max_attempts: u32, wait_min: Duration, wait_max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait_min,
            wait_max: wait_max.max(wait_min),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-indexed): `wait_min * 2^retry`, capped.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.wait_min.saturating_mul(factor).min(self.wait_max)
    }

    /// Delay honoring a server-provided `Retry-After`, still capped at `wait_max`.
    #[must_use]
    pub fn delay_with_hint(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.max(self.delay(retry)).min(self.wait_max),
            None => self.delay(retry),
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(1), Duration::from_secs(30))
    }
}
