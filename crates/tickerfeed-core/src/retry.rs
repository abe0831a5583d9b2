//! Bounded retry with linear backoff for a single provider.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::data_source::SourceError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per provider, first call included.
    pub max_attempts: u32,
    /// Attempt `n` (1-based) is followed by a sleep of `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }
}

/// Runs `operation` until it succeeds, returns a non-retryable error, or the
/// attempt budget is spent. The last error is returned on exhaustion.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if error.retryable() && attempt < max_attempts => {
                let delay = config.delay(attempt);
                debug!(attempt, ?delay, code = error.code(), "retrying provider call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
