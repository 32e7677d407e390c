//! Classification of failed HTTP calls into [`ClientError`]s.

use log::debug;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::sync::Arc;

use crate::body::{BodyDecoder, MapDecoder};
use crate::error::{ClientError, HttpError, Retryable};

/// A non-2xx response captured for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedResponse {
    pub status: StatusCode,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FailedResponse {
    pub fn new(status: StatusCode, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Consumes a response, reading its body.
    ///
    /// A body that cannot be read is treated as empty, so the status is
    /// still classified.
    pub async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                debug!("Failed to read error body from {}: {}", url, e);
                Vec::new()
            }
        };

        Self {
            status,
            url,
            headers,
            body,
        }
    }
}

/// Turns failed calls into errors for the caller.
///
/// Injected into [`crate::http::HttpClient`].
#[cfg_attr(test, mockall::automock)]
pub trait ErrorHandler: Send + Sync {
    /// Called for every response with a non-2xx status.
    fn handle_status(&self, response: &FailedResponse) -> ClientError;

    /// Called when no response was received.
    fn handle_transport(&self, url: &str, error: reqwest::Error) -> ClientError;
}

/// Stateless classifier for failed HTTP responses.
///
/// Only 400 and 404 are known not to be retryable. Every other status is
/// left as [`Retryable::Unknown`].
#[derive(Debug, Clone)]
pub struct HttpErrorClassifier {
    decoder: Arc<dyn BodyDecoder>,
}

impl Default for HttpErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpErrorClassifier {
    /// A classifier that reads error bodies with [`MapDecoder`].
    pub fn new() -> Self {
        Self::with_decoder(MapDecoder)
    }

    pub fn with_decoder(decoder: impl BodyDecoder + 'static) -> Self {
        Self {
            decoder: Arc::new(decoder),
        }
    }

    pub fn decoder(&self) -> &dyn BodyDecoder {
        self.decoder.as_ref()
    }

    pub fn retryable_for(status: StatusCode) -> Retryable {
        match status {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Retryable::NotRetryable,
            _ => Retryable::Unknown,
        }
    }

    #[tracing::instrument(skip(self, response), fields(status = response.status.as_u16()))]
    pub fn classify(&self, response: &FailedResponse) -> HttpError {
        let body = self.decode_body(response);

        let message = body
            .as_ref()
            .and_then(|b| b.best_message())
            .map(str::to_string)
            .or_else(|| response.status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", response.status.as_u16()));

        HttpError::new(
            response.status,
            response.url.clone(),
            message,
            Self::retryable_for(response.status),
            response.headers.clone(),
            body,
        )
    }

    fn decode_body(&self, response: &FailedResponse) -> Option<crate::body::ErrorBody> {
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        match self.decoder.decode(&response.body) {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(
                    "{} decoder could not read error body from {}: {}",
                    self.decoder.name(),
                    response.url,
                    e
                );
                None
            }
        }
    }
}

impl ErrorHandler for HttpErrorClassifier {
    fn handle_status(&self, response: &FailedResponse) -> ClientError {
        ClientError::Http(self.classify(response))
    }

    fn handle_transport(&self, url: &str, error: reqwest::Error) -> ClientError {
        let url = url.to_string();
        if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
            ClientError::Network { url, source: error }
        } else {
            ClientError::Unexpected { url, source: error }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{ErrorKind, LenientTypedDecoder, TypedDecoder};

    const URL: &str = "http://localhost/foo";
    const NOT_FOUND_BODY: &str =
        r#"{"timestamp": "123123123123", "message": "Not Found error Message"}"#;

    fn all_classifiers() -> Vec<HttpErrorClassifier> {
        vec![
            HttpErrorClassifier::new(),
            HttpErrorClassifier::with_decoder(TypedDecoder),
            HttpErrorClassifier::with_decoder(LenientTypedDecoder),
        ]
    }

    #[test]
    fn test_not_found_is_not_retryable() {
        let response = FailedResponse::new(StatusCode::NOT_FOUND, URL);
        let err = HttpErrorClassifier::new().classify(&response);

        assert_eq!(err.status_code(), 404);
        assert_eq!(err.retryable(), Retryable::NotRetryable);
        assert_eq!(err.retryable().as_option(), Some(false));
        assert_eq!(err.message(), "Not Found");
        assert!(err.body().is_none());
    }

    #[test]
    fn test_not_found_with_extra_field_under_every_decoder() {
        let response = FailedResponse::new(StatusCode::NOT_FOUND, URL).with_body(NOT_FOUND_BODY);

        for classifier in all_classifiers() {
            let err = classifier.classify(&response);
            assert_eq!(err.status_code(), 404, "decoder {}", classifier.decoder().name());
            assert_eq!(
                err.retryable(),
                Retryable::NotRetryable,
                "decoder {}",
                classifier.decoder().name()
            );
            assert_eq!(err.message(), "Not Found error Message");
        }
    }

    #[test]
    fn test_bad_request_is_not_retryable() {
        let response = FailedResponse::new(StatusCode::BAD_REQUEST, URL);
        let err = HttpErrorClassifier::new().classify(&response);

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.retryable().as_option(), Some(false));
    }

    #[test]
    fn test_other_client_error_has_unknown_retryable() {
        let response = FailedResponse::new(StatusCode::GONE, URL);
        let err = HttpErrorClassifier::new().classify(&response);

        assert_eq!(err.status_code(), 410);
        assert_eq!(err.retryable(), Retryable::Unknown);
        assert_eq!(err.retryable().as_option(), None);
    }

    #[test]
    fn test_server_error_has_unknown_retryable() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert_eq!(HttpErrorClassifier::retryable_for(status), Retryable::Unknown);
        }
        assert_eq!(
            HttpErrorClassifier::retryable_for(StatusCode::TOO_MANY_REQUESTS),
            Retryable::Unknown
        );
    }

    #[test]
    fn test_classify_is_idempotent() {
        let response = FailedResponse::new(StatusCode::NOT_FOUND, URL).with_body(NOT_FOUND_BODY);
        let classifier = HttpErrorClassifier::new();

        assert_eq!(classifier.classify(&response), classifier.classify(&response));
    }

    #[test]
    fn test_malformed_body_does_not_fail_classification() {
        let response =
            FailedResponse::new(StatusCode::NOT_FOUND, URL).with_body("<html>Not here</html>");

        for classifier in all_classifiers() {
            let err = classifier.classify(&response);
            assert_eq!(err.retryable(), Retryable::NotRetryable);
            assert!(err.body().is_none());
            assert_eq!(err.message(), "Not Found");
        }
    }

    #[test]
    fn test_unknown_kind_handling_per_decoder() {
        let response = FailedResponse::new(StatusCode::NOT_FOUND, URL)
            .with_body(r#"{"message": "missing", "kind": "TEAPOT"}"#);

        let strict = HttpErrorClassifier::with_decoder(TypedDecoder).classify(&response);
        assert!(strict.body().is_none());
        assert_eq!(strict.message(), "Not Found");
        assert_eq!(strict.retryable(), Retryable::NotRetryable);

        for classifier in [
            HttpErrorClassifier::new(),
            HttpErrorClassifier::with_decoder(LenientTypedDecoder),
        ] {
            let err = classifier.classify(&response);
            assert_eq!(err.body().and_then(|b| b.kind), None);
            assert_eq!(err.message(), "missing");
            assert_eq!(err.retryable(), Retryable::NotRetryable);
        }
    }

    #[test]
    fn test_known_kind_is_kept() {
        let response = FailedResponse::new(StatusCode::BAD_REQUEST, URL)
            .with_body(r#"{"kind": "BAD_REQUEST", "error": "Bad Request"}"#);
        let err = HttpErrorClassifier::with_decoder(TypedDecoder).classify(&response);

        assert_eq!(err.body().and_then(|b| b.kind), Some(ErrorKind::BadRequest));
        assert_eq!(err.message(), "Bad Request");
    }

    #[test]
    fn test_whitespace_body_is_treated_as_empty() {
        let response = FailedResponse::new(StatusCode::GONE, URL).with_body(" \n");
        let err = HttpErrorClassifier::with_decoder(TypedDecoder).classify(&response);

        assert!(err.body().is_none());
        assert_eq!(err.message(), "Gone");
    }

    #[test]
    fn test_nonstandard_status_message() {
        let status = StatusCode::from_u16(499).unwrap();
        let err = HttpErrorClassifier::new().classify(&FailedResponse::new(status, URL));

        assert_eq!(err.message(), "HTTP 499");
        assert_eq!(err.retryable(), Retryable::Unknown);
    }

    #[test]
    fn test_handle_status_wraps_classification() {
        let response = FailedResponse::new(StatusCode::NOT_FOUND, URL);
        let err = HttpErrorClassifier::new().handle_status(&response);

        assert_eq!(err.as_http().map(HttpError::status_code), Some(404));
        assert_eq!(err.retryable(), Retryable::NotRetryable);
    }

    #[tokio::test]
    async fn test_handle_transport_connection_refused() {
        // Nothing listens on port 9 (discard) in test environments.
        let url = "http://127.0.0.1:9/";
        let error = reqwest::Client::new().get(url).send().await.unwrap_err();

        let err = HttpErrorClassifier::new().handle_transport(url, error);
        assert!(matches!(err, ClientError::Network { .. }));
        assert_eq!(err.retryable(), Retryable::Unknown);
    }

    #[tokio::test]
    async fn test_failed_response_read_captures_body_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/foo")
            .with_status(404)
            .with_header("x-request-id", "abc")
            .with_body(NOT_FOUND_BODY)
            .create_async()
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/foo", server.url()))
            .send()
            .await
            .unwrap();
        let failed = FailedResponse::read(response).await;

        assert_eq!(failed.status, StatusCode::NOT_FOUND);
        assert_eq!(failed.body, NOT_FOUND_BODY.as_bytes());
        assert_eq!(failed.headers.get("x-request-id").unwrap(), "abc");
        assert!(failed.url.ends_with("/foo"));
    }
}
