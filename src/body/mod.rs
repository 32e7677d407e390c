//! Decoding of error bodies returned with failed responses.
//!
//! Three strategies are available. They differ in how strictly they read the
//! body, but all of them ignore fields they do not know about:
//!
//! - [`MapDecoder`] reads the body as a free-form JSON object
//! - [`TypedDecoder`] reads it into a typed struct and rejects unknown `kind` values
//! - [`LenientTypedDecoder`] reads it into a typed struct and maps unknown `kind` values to `None`

mod map;
mod typed;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub use map::MapDecoder;
pub use typed::{LenientTypedDecoder, TypedDecoder};

/// Category of failure reported by the server in the `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Unauthorized,
    Forbidden,
    Conflict,
    Internal,
}

/// Error payload decoded from a failed response.
///
/// Fields the decoder does not pick out are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
    pub status: Option<u16>,
    pub timestamp: Option<Value>,
    pub path: Option<String>,
    pub kind: Option<ErrorKind>,
    pub extra: Map<String, Value>,
}

impl ErrorBody {
    /// First non-empty of `message` and `error`.
    pub fn best_message(&self) -> Option<&str> {
        [self.message.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|m| !m.is_empty())
    }
}

/// A strategy for reading the body of a failed response.
pub trait BodyDecoder: Send + Sync + fmt::Debug {
    /// Short name used in logs and on the command line.
    fn name(&self) -> &'static str;

    /// Decodes a non-empty body.
    fn decode(&self, body: &[u8]) -> Result<ErrorBody, serde_json::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_wire_names() {
        let kind: ErrorKind = serde_json::from_value(Value::from("BAD_REQUEST")).unwrap();
        assert_eq!(kind, ErrorKind::BadRequest);
        assert_eq!(
            serde_json::to_value(ErrorKind::NotFound).unwrap(),
            Value::from("NOT_FOUND")
        );
        assert!(serde_json::from_value::<ErrorKind>(Value::from("TEAPOT")).is_err());
    }

    #[test]
    fn test_best_message_prefers_message() {
        let body = ErrorBody {
            message: Some("Not Found error Message".to_string()),
            error: Some("Not Found".to_string()),
            ..Default::default()
        };
        assert_eq!(body.best_message(), Some("Not Found error Message"));
    }

    #[test]
    fn test_best_message_skips_blank_message() {
        let body = ErrorBody {
            message: Some("  ".to_string()),
            error: Some("Gone".to_string()),
            ..Default::default()
        };
        assert_eq!(body.best_message(), Some("Gone"));

        assert_eq!(ErrorBody::default().best_message(), None);
    }
}
