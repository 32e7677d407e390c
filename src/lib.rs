//! Translation of failed HTTP calls into classified errors with retry guidance.
//!
//! [`classify::HttpErrorClassifier`] turns a failed response into an
//! [`error::HttpError`] whose [`error::Retryable`] flag says whether the call
//! is worth repeating. [`http::HttpClient`] is a reqwest wrapper that routes
//! every failure through an injected [`classify::ErrorHandler`] and retries
//! accordingly.

pub mod body;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;

pub use classify::{ErrorHandler, FailedResponse, HttpErrorClassifier};
pub use error::{ClientError, ErrorReport, HttpError, Retryable};
