//! Retry logic with exponential backoff
//!
//! The agent loop uses [`RetryPolicy::backoff_duration`] directly so each
//! retry can be charged against its iteration budget; [`RetryPolicy::execute`]
//! covers one-shot calls made outside the loop.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of consecutive attempts
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Backoff before retry number `attempt` (1-based), capped at `max_backoff`
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Execute an async operation, retrying errors the predicate accepts
    pub async fn execute<F, Fut, T, E, R>(
        &self,
        operation_name: &str,
        mut operation: F,
        is_retryable: R,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                operation = operation_name,
                attempt,
                max_attempts = self.max_attempts,
                "Attempting operation"
            );

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let backoff = self.backoff_duration(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Operation failed, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(e) => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "Operation failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
