//! Error types returned by the client and the classifier.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::body::ErrorBody;

/// Whether a failed request may be attempted again.
///
/// `Unknown` is distinct from `NotRetryable`: it means no rule classified the
/// failure, and the caller is free to apply its own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "Option<bool>")]
pub enum Retryable {
    Retryable,
    NotRetryable,
    #[default]
    Unknown,
}

impl Retryable {
    /// `Some(true)`, `Some(false)` or `None` for unknown.
    pub fn as_option(self) -> Option<bool> {
        match self {
            Retryable::Retryable => Some(true),
            Retryable::NotRetryable => Some(false),
            Retryable::Unknown => None,
        }
    }
}

impl From<Option<bool>> for Retryable {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Retryable::Retryable,
            Some(false) => Retryable::NotRetryable,
            None => Retryable::Unknown,
        }
    }
}

impl From<Retryable> for Option<bool> {
    fn from(value: Retryable) -> Self {
        value.as_option()
    }
}

impl fmt::Display for Retryable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retryable::Retryable => write!(f, "true"),
            Retryable::NotRetryable => write!(f, "false"),
            Retryable::Unknown => write!(f, "null"),
        }
    }
}

/// A failed HTTP response after classification.
///
/// Built once by [`crate::classify::HttpErrorClassifier`] and read-only after
/// that.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    status: StatusCode,
    url: String,
    message: String,
    retryable: Retryable,
    headers: HeaderMap,
    body: Option<ErrorBody>,
}

impl HttpError {
    pub(crate) fn new(
        status: StatusCode,
        url: String,
        message: String,
        retryable: Retryable,
        headers: HeaderMap,
        body: Option<ErrorBody>,
    ) -> Self {
        Self {
            status,
            url,
            message,
            retryable,
            headers,
            body,
        }
    }

    /// Returns the HTTP status of the failed response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the HTTP status as a number.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the URL the failed response came from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Message taken from the error body, falling back to the reason phrase.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether the call may be attempted again.
    pub fn retryable(&self) -> Retryable {
        self.retryable
    }

    /// Returns the headers of the failed response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The decoded error body, if there was one and it could be read.
    pub fn body(&self) -> Option<&ErrorBody> {
        self.body.as_ref()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status: {}, URL: {}, Message: {}",
            self.status.as_u16(),
            self.url,
            self.message
        )
    }
}

impl std::error::Error for HttpError {}

/// Everything an [`crate::http::HttpClient`] call can fail with.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Network error calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write response from {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {url} failed: {source}")]
    Unexpected {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// Returns the retry guidance for this failure.
    pub fn retryable(&self) -> Retryable {
        match self {
            ClientError::Http(e) => e.retryable(),
            // A response that arrived but does not match the expected type
            // will not match on the next attempt either.
            ClientError::Decode { .. } => Retryable::NotRetryable,
            ClientError::Network { .. } | ClientError::Io { .. } | ClientError::Unexpected { .. } => {
                Retryable::Unknown
            }
        }
    }

    /// Returns the URL of the failed call.
    pub fn url(&self) -> &str {
        match self {
            ClientError::Http(e) => e.url(),
            ClientError::Network { url, .. }
            | ClientError::Decode { url, .. }
            | ClientError::Io { url, .. }
            | ClientError::Unexpected { url, .. } => url,
        }
    }

    /// The classified HTTP error, if the server answered with an error status.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            ClientError::Http(e) => Some(e),
            _ => None,
        }
    }

    /// Summarizes the failure for display.
    pub fn report(&self) -> ErrorReport {
        let kind = match self {
            ClientError::Http(_) => "http",
            ClientError::Network { .. } => "network",
            ClientError::Decode { .. } => "decode",
            ClientError::Io { .. } => "io",
            ClientError::Unexpected { .. } => "unexpected",
        };
        let message = match self {
            ClientError::Http(e) => e.message().to_string(),
            other => other.to_string(),
        };

        ErrorReport {
            kind,
            status: self.as_http().map(HttpError::status_code),
            url: self.url().to_string(),
            message,
            retryable: self.retryable(),
        }
    }
}

/// Serializable summary of a failure, as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub url: String,
    pub message: String,
    pub retryable: Retryable,
}

impl From<&HttpError> for ErrorReport {
    fn from(error: &HttpError) -> Self {
        ErrorReport {
            kind: "http",
            status: Some(error.status_code()),
            url: error.url().to_string(),
            message: error.message().to_string(),
            retryable: error.retryable(),
        }
    }
}
