//! Retry policy for transient server failures.
//!
//! A request is retried only when a response was received and its status is
//! 429 or 5xx. Transport failures and cancellations surface immediately.
//! Retries use a fixed delay and a bounded count; each resubmission goes
//! back through the full pipeline so it can be coalesced or served from
//! cache like any fresh request.

use std::time::Duration;

use crate::error::FetchError;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay between attempts (in milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3000;

/// Bounded, fixed-delay retry policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` retries spaced by `delay`.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Overrides the retry count, keeping the delay.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Overrides the delay, keeping the retry count.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the delay to wait before retrying, or `None` to give up.
    ///
    /// # Arguments
    ///
    /// * `attempts_so_far` - Retries already performed for this call
    /// * `error` - The error the latest attempt produced
    pub fn next_delay(&self, attempts_so_far: u32, error: &FetchError) -> Option<Duration> {
        if error.is_retryable() && attempts_so_far < self.max_retries {
            Some(self.delay)
        } else {
            None
        }
    }

    /// Total attempts a call makes when every attempt fails retryably.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
