//! Bounded retry with per-attempt timeout.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ReasoningConfig, RetryConfig};
use crate::error::{AdaptiveError, Result};

/// Exponential backoff policy for outbound calls.
///
/// Each attempt is bounded by `timeout`. Only transient errors (see
/// [`AdaptiveError::is_transient`]) are retried; the delay doubles after
/// every retry and never exceeds `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), &ReasoningConfig::default())
    }
}

impl RetryPolicy {
    /// Builds a policy from the retry and reasoning configuration sections.
    #[must_use]
    pub const fn from_config(retry: &RetryConfig, reasoning: &ReasoningConfig) -> Self {
        Self {
            max_attempts: retry.max_attempts,
            initial_backoff: Duration::from_millis(retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(retry.max_backoff_ms),
            timeout: reasoning.request_timeout(),
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn single_attempt(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            timeout,
        }
    }

    /// Returns the delay before attempt `attempt + 1` (1-based `attempt`).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the last error, or [`AdaptiveError::Timeout`] if the final
    /// attempt did not settle in time.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AdaptiveError::timeout(operation, self.timeout.as_secs())),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
