//! Bounded retry for transient store failures
//!
//! Only errors classified as transient (`AppError::is_transient`) are retried;
//! everything else is returned on the first failure.

use coach_core::config::BookingConfig;
use coach_core::AppResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempts and base backoff for store calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &BookingConfig) -> Self {
        Self::new(
            config.store_retry_attempts,
            Duration::from_millis(config.store_retry_backoff_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BookingConfig::default())
    }
}

/// Run `op`, retrying transient failures with exponential backoff
pub async fn with_store_retry<T, F, Fut>(policy: RetryPolicy, action: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                let delay = policy.backoff * 2u32.saturating_pow(attempt - 1);
                warn!(
                    "Transient failure trying to {} (attempt {}/{}): {}; retrying in {:?}",
                    action, attempt, policy.attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
