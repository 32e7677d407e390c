//! HTTP client module with classification-aware retries.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::{MAX_ATTEMPTS, RETRY_DELAY_MS, RetryConfig, should_retry, with_retry};
