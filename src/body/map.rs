use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{BodyDecoder, ErrorBody};

/// Reads the body as a free-form JSON object.
///
/// Known fields are picked out when they have the expected JSON type and
/// left in `extra` otherwise. Never rejects an object.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapDecoder;

impl BodyDecoder for MapDecoder {
    fn name(&self) -> &'static str {
        "map"
    }

    fn decode(&self, body: &[u8]) -> Result<ErrorBody, serde_json::Error> {
        let mut fields: Map<String, Value> = serde_json::from_slice(body)?;

        let message = take_string(&mut fields, "message");
        let error = take_string(&mut fields, "error");
        let path = take_string(&mut fields, "path");
        let timestamp = fields.remove("timestamp");

        let status = take_parsed(&mut fields, "status");
        let kind = take_parsed(&mut fields, "kind");

        Ok(ErrorBody {
            message,
            error,
            status,
            timestamp,
            path,
            kind,
            extra: fields,
        })
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !fields.get(key).is_some_and(Value::is_string) {
        return None;
    }
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Removes `key` only when its value deserializes as `T`.
fn take_parsed<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = fields.get(key)?.clone();
    match serde_json::from_value(value) {
        Ok(parsed) => {
            fields.remove(key);
            Some(parsed)
        }
        Err(e) => {
            debug!("Keeping '{}' in extra fields: {}", key, e);
            None
        }
    }
}
