//! Bounded retry with exponential backoff for provider fetches.
//!
//! Only transient failures are retried (network errors and rate limiting).
//! Malformed payloads and coverage failures are returned immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use wxstar_core::RefreshConfig;

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    pub fn from_refresh(config: &RefreshConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            DEFAULT_MAX_DELAY_MS,
        )
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Calculate the delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Exponential backoff: initial_delay * 2^attempt
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn retry_decision(&self) -> RetryDecision;

    /// Server-requested wait, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// retries. The last error is returned.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("Request succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if e.retry_decision() == RetryDecision::NoRetry {
                    tracing::debug!("Non-retryable error: {}", e);
                    return Err(e);
                }
                if attempt >= config.max_retries {
                    tracing::warn!("All {} attempts exhausted: {}", attempt + 1, e);
                    return Err(e);
                }

                let backoff = config.delay_for_attempt(attempt);
                let delay = e
                    .retry_after()
                    .map_or(backoff, |wait| wait.max(backoff).min(config.max_delay));
                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}, waiting {:?}",
                    attempt + 1,
                    config.max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
