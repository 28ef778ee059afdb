//! Request pacing and retry timing

use crate::source::RateLimit;
use std::time::Duration;

/// Timing derived from a source's `rateLimit` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Tries per page, at least 1
    pub max_attempts: u32,

    /// Base backoff, scaled linearly by the attempt number
    pub base_delay: Duration,

    /// Pause between consecutive page requests
    pub request_interval: Duration,

    /// HTTP client deadline per request
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_rate_limit(limits: &RateLimit) -> Self {
        let interval_ms = if limits.requests_per_second > 0.0 {
            (1000.0 / limits.requests_per_second).round() as u64
        } else {
            0
        };

        Self {
            max_attempts: limits.retry_attempts.max(1),
            base_delay: Duration::from_millis(limits.retry_delay),
            request_interval: Duration::from_millis(interval_ms),
            request_timeout: Duration::from_millis(limits.request_timeout),
        }
    }

    /// Wait after failed `attempt` (1-based), or `None` when it was the last
    pub fn backoff_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.base_delay * attempt)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_rate_limit(&RateLimit::default())
    }
}
