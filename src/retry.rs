//! Retry decisions and backoff for failed requests.
//!
//! [`RetryPolicy::decide`] is a pure function of the failure and the retries already spent
//! on the logical request. It grants a retry only when the failure is retry-eligible (see
//! [`Error::is_retry_eligible`]) and the retry budget is not exhausted. Delays grow as
//! `base_delay * 2^retries_spent` with no jitter and no cap.

use crate::Error;
use std::time::Duration;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Bounded exponential retry policy.
///
/// # Examples
///
/// ```
/// use pmo_client::RetryPolicy;
/// use std::time::Duration;
///
/// // Delays before retries: 100ms, 200ms, 400ms
/// let policy = RetryPolicy::new(3, Duration::from_millis(100));
///
/// assert_eq!(policy.delay_for(0), Duration::from_millis(100));
/// assert_eq!(policy.delay_for(2), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// The delay before the first retry; doubled for every later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

/// The outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made.
    pub retry: bool,
    /// How long to wait before it. Zero when `retry` is `false`.
    pub delay: Duration,
}

impl RetryDecision {
    /// A decision to stop.
    pub const fn stop() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns the delay before the retry made after `retries_spent` earlier retries.
    pub fn delay_for(&self, retries_spent: u32) -> Duration {
        let multiplier = 2u32.checked_pow(retries_spent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Decides whether `failure` should be retried given the retries already spent.
    pub fn decide(&self, failure: &Error, retries_spent: u32) -> RetryDecision {
        if !failure.is_retry_eligible() || retries_spent >= self.max_retries {
            return RetryDecision::stop();
        }

        RetryDecision {
            retry: true,
            delay: self.delay_for(retries_spent),
        }
    }
}
