//! Retry strategy and the shared retry-with-backoff combinator.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::{Config, RETRY_FACTOR, RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_SECS};
use crate::error_handling::ErrorCategory;

/// Returns the backoff delay before retry number `attempt` (1-based).
///
/// Exponential with a bounded maximum: `RETRY_INITIAL_DELAY_MS`, multiplied
/// by `RETRY_FACTOR` per attempt, capped at `RETRY_MAX_DELAY_SECS`.
///
/// `ExponentialBackoff::from_millis(base)` treats `base` as the exponent
/// base, so the growth factor goes there and the initial delay becomes the
/// scaling factor (500ms, 1s, 2s, 4s, ... for the defaults).
pub fn backoff_delay(attempt: u32) -> Duration {
    let strategy = ExponentialBackoff::from_millis(RETRY_FACTOR)
        .factor(RETRY_INITIAL_DELAY_MS / RETRY_FACTOR)
        .max_delay(Duration::from_secs(RETRY_MAX_DELAY_SECS));
    strategy
        .skip(attempt.saturating_sub(1) as usize)
        .take(1)
        .next()
        .unwrap_or(Duration::from_secs(RETRY_MAX_DELAY_SECS))
}

/// Returns the retry budget for an error category.
///
/// Network and timeout failures get the full budget. Anti-automation and
/// missing-element failures get the smaller structural budget: they usually
/// need a selector fix, not patience. Skip conditions and unknown errors are
/// never retried.
pub fn retry_budget(category: ErrorCategory, config: &Config) -> u32 {
    match category {
        ErrorCategory::Network | ErrorCategory::Timeout => config.max_network_retries,
        ErrorCategory::AntiAutomation | ErrorCategory::FormElementNotFound => {
            config.max_structural_retries
        }
        ErrorCategory::Skip | ErrorCategory::Unknown => 0,
    }
}

/// Runs an async operation, retrying with exponential backoff on failure.
///
/// `max_attempts` counts the initial attempt; the final error is returned
/// after the budget is exhausted. Used for operations where in-place retry
/// is the right recovery (durable storage writes); job-level retries go
/// through the queue engine's own state machine instead so that counters and
/// status transitions stay observable.
pub async fn retry_with_backoff<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = backoff_delay(attempt);
                log::debug!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
