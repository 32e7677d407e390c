//! Retry logic driven by error classification.

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use crate::error::{ClientError, Retryable};

/// Default number of attempts, including the first one.
pub const MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Retry settings for an [`super::HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(RETRY_DELAY_MS),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that makes a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(retry as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// Whether an error is worth another attempt.
///
/// An explicit classification wins. Unclassified failures are retried only
/// when they look transient: no response at all, or a 5xx.
pub fn should_retry(error: &ClientError) -> bool {
    match error.retryable() {
        Retryable::Retryable => true,
        Retryable::NotRetryable => false,
        Retryable::Unknown => match error {
            ClientError::Network { .. } => true,
            ClientError::Http(e) => e.status().is_server_error(),
            _ => false,
        },
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, ClientError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    debug!("{}: non-retryable error: {}", operation_name, e);
                    return Err(e);
                }
                if attempt >= max_attempts {
                    debug!(
                        "{}: giving up after {} attempts: {}",
                        operation_name, attempt, e
                    );
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                    operation_name,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
