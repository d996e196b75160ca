//! Retry with exponential backoff for upstream calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;

/// How many times to try an upstream call and how long to wait in between.
///
/// The attempt budget is the caller's `retries` value with a floor of one and
/// a ceiling of the configured maximum. Waits are `base`, `2 * base`,
/// `4 * base`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(requested: u32, config: &RetryConfig) -> Self {
        Self {
            attempts: requested.clamp(1, config.max_attempts.max(1)),
            backoff_base: config.backoff_base,
        }
    }

    /// Total attempts this policy allows.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait after the given zero-based failed attempt.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or the budget is spent. The last error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the error from the final attempt.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.attempts {
                        warn!(attempts = attempt, error = %e, "upstream retries exhausted");
                        return Err(e);
                    }
                    let wait = self.backoff(attempt - 1);
                    debug!(
                        attempt,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "upstream attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
