//! Pacing and retry policy for enrollment

use std::time::Duration;

use crate::config::EnrollmentSettings;

/// Rate-limit and retry knobs handed to the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Minimum gap between two outbound enrollment calls
    pub min_delay: Duration,
    /// Retries after a transient failure, per course
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Wait after the platform answers 429
    pub rate_limited_delay: Duration,
    /// Rate-limit waits per course before giving up on it
    pub max_rate_limit_retries: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            rate_limited_delay: Duration::from_secs(60),
            max_rate_limit_retries: 2,
        }
    }
}

impl From<&EnrollmentSettings> for RateLimitPolicy {
    fn from(settings: &EnrollmentSettings) -> Self {
        Self {
            min_delay: Duration::from_millis(settings.min_delay_ms),
            max_retries: settings.max_retries,
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
            backoff_max: Duration::from_millis(settings.backoff_max_ms),
            rate_limited_delay: Duration::from_millis(settings.rate_limited_delay_ms),
            ..Self::default()
        }
    }
}

impl RateLimitPolicy {
    /// Near-zero delays, same retry counts. Meant for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            min_delay: Duration::ZERO,
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(1),
            rate_limited_delay: Duration::from_millis(1),
            ..Self::default()
        }
    }

    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `backoff_max`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}
