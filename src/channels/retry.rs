//! Backoff schedule shared by Slack Web API calls and RTM reconnects

use std::time::{Duration, SystemTime};

/// `error` codes Slack puts in `ok: false` bodies that clear up on their own
const TRANSIENT_SLACK_ERRORS: &[&str] = &[
    "ratelimited",
    "internal_error",
    "fatal_error",
    "service_unavailable",
    "request_timeout",
];

/// How often and how patiently a Slack operation is repeated
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first Web API call
    pub max_retries: u32,
    /// Wait before the second attempt; doubled for each one after
    pub base_delay: Duration,
    /// No single wait exceeds this
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` failed ones
    #[must_use]
    pub const fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Wait before the next attempt
    ///
    /// A server-provided `retry_after` wins over the computed backoff.
    /// Both are clamped to `max_delay`.
    #[must_use]
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let wait = retry_after.unwrap_or_else(|| {
            let backoff = self.backoff(attempt);
            backoff + jitter(backoff)
        });
        wait.min(self.max_delay)
    }

    /// `base_delay * 2^attempt`, saturating
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Up to a quarter of `backoff`, seeded from the clock
fn jitter(backoff: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    backoff.mul_f64(f64::from(nanos % 250) / 1000.0)
}

/// Whether a failed Slack call is worth repeating
///
/// HTTP 429 and 5xx always are. A 200 with `ok: false` is only when its
/// `error` code is one of the transient ones.
#[must_use]
pub fn is_recoverable(status: u16, error_code: Option<&str>) -> bool {
    status == 429
        || (500..=599).contains(&status)
        || error_code.is_some_and(|code| TRANSIENT_SLACK_ERRORS.contains(&code))
}

/// Seconds from a `Retry-After` header
#[must_use]
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value?.trim().parse().ok().map(Duration::from_secs)
}
