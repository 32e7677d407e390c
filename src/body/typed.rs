use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::{BodyDecoder, ErrorBody, ErrorKind};

/// Reads the body into a typed struct.
///
/// Unknown fields are ignored, but a `kind` value outside [`ErrorKind`] is a
/// decode error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedDecoder;

/// Like [`TypedDecoder`], but an unrecognised `kind` value reads as `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientTypedDecoder;

#[derive(Deserialize)]
struct StrictBody {
    message: Option<String>,
    error: Option<String>,
    status: Option<u16>,
    timestamp: Option<Value>,
    path: Option<String>,
    kind: Option<ErrorKind>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct LenientBody {
    message: Option<String>,
    error: Option<String>,
    status: Option<u16>,
    timestamp: Option<Value>,
    path: Option<String>,
    #[serde(default, deserialize_with = "unknown_as_none")]
    kind: Option<ErrorKind>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn unknown_as_none<'de, D>(deserializer: D) -> Result<Option<ErrorKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

impl From<StrictBody> for ErrorBody {
    fn from(b: StrictBody) -> Self {
        ErrorBody {
            message: b.message,
            error: b.error,
            status: b.status,
            timestamp: b.timestamp,
            path: b.path,
            kind: b.kind,
            extra: b.extra,
        }
    }
}

impl From<LenientBody> for ErrorBody {
    fn from(b: LenientBody) -> Self {
        ErrorBody {
            message: b.message,
            error: b.error,
            status: b.status,
            timestamp: b.timestamp,
            path: b.path,
            kind: b.kind,
            extra: b.extra,
        }
    }
}

impl BodyDecoder for TypedDecoder {
    fn name(&self) -> &'static str {
        "typed"
    }

    fn decode(&self, body: &[u8]) -> Result<ErrorBody, serde_json::Error> {
        serde_json::from_slice::<StrictBody>(body).map(ErrorBody::from)
    }
}

impl BodyDecoder for LenientTypedDecoder {
    fn name(&self) -> &'static str {
        "lenient"
    }

    fn decode(&self, body: &[u8]) -> Result<ErrorBody, serde_json::Error> {
        serde_json::from_slice::<LenientBody>(body).map(ErrorBody::from)
    }
}
