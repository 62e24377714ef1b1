//! The record model: `{ts, data}`, and the binary transport envelope.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use substrate_error::SubstrateError;

const BINARY_MARKER_FIELD: &str = "__binary";
const BINARY_ENCODING_FIELD: &str = "encoding";
const BINARY_DATA_FIELD: &str = "data";
const BINARY_ENCODING_BASE64: &str = "base64";

/// The payload carried by a [`Record`]: either a plain JSON value or raw
/// bytes. Binary payloads only ever appear on the wire as the
/// `{__binary: true, encoding: "base64", data: "..."}` envelope — that shape
/// is a transport concern, not a third payload variant callers need to know
/// about.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// A JSON value (object, array, string, number, bool, or null).
    Json(Value),
    /// Raw bytes, transported as base64.
    Binary(Vec<u8>),
}

impl PayloadValue {
    /// `true` if this is the [`PayloadValue::Binary`] variant.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Borrow the JSON value, if this is [`PayloadValue::Json`].
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Binary(_) => None,
        }
    }

    /// Borrow the raw bytes, if this is [`PayloadValue::Binary`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            Self::Json(_) => None,
        }
    }

    /// Detect and decode the binary transport envelope from a raw JSON
    /// value. Any other shape is treated as an opaque JSON payload.
    pub fn from_wire_value(value: Value) -> Result<Self, SubstrateError> {
        if let Value::Object(ref map) = value {
            if let Some(Value::Bool(true)) = map.get(BINARY_MARKER_FIELD) {
                let encoding = map
                    .get(BINARY_ENCODING_FIELD)
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if encoding != BINARY_ENCODING_BASE64 {
                    return Err(SubstrateError::validation_failed(format!(
                        "unsupported binary encoding: {encoding}"
                    )));
                }
                let data = map
                    .get(BINARY_DATA_FIELD)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SubstrateError::validation_failed("binary envelope missing data field")
                    })?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .map_err(|e| {
                        SubstrateError::validation_failed(format!("invalid base64 data: {e}"))
                    })?;
                return Ok(Self::Binary(bytes));
            }
        }
        Ok(Self::Json(value))
    }

    /// Encode back to the wire shape: plain JSON passes through unchanged,
    /// binary data is wrapped in the `__binary` envelope.
    pub fn to_wire_value(&self) -> Value {
        match self {
            Self::Json(v) => v.clone(),
            Self::Binary(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::json!({
                    BINARY_MARKER_FIELD: true,
                    BINARY_ENCODING_FIELD: BINARY_ENCODING_BASE64,
                    BINARY_DATA_FIELD: encoded,
                })
            }
        }
    }
}

impl Serialize for PayloadValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PayloadValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_wire_value(value).map_err(serde::de::Error::custom)
    }
}

/// A stored record: a timestamp and a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// When this record was written, as tracked by the backend.
    pub ts: DateTime<Utc>,
    /// The record's payload.
    pub data: PayloadValue,
}

impl Record {
    /// Construct a record with a JSON payload and the given timestamp.
    pub fn new(ts: DateTime<Utc>, data: PayloadValue) -> Self {
        Self { ts, data }
    }

    /// Construct a record with a JSON payload, stamped `now`.
    pub fn json_now(data: Value, now: DateTime<Utc>) -> Self {
        Self::new(now, PayloadValue::Json(data))
    }

    /// Construct a record with a binary payload, stamped `now`.
    pub fn binary_now(data: Vec<u8>, now: DateTime<Utc>) -> Self {
        Self::new(now, PayloadValue::Binary(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_payload_roundtrips_unchanged() {
        let p = PayloadValue::Json(json!({"a": 1}));
        let wire = p.to_wire_value();
        assert_eq!(wire, json!({"a": 1}));
        let back = PayloadValue::from_wire_value(wire).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn binary_payload_wraps_and_unwraps() {
        let bytes = vec![0u8, 1, 2, 255];
        let p = PayloadValue::Binary(bytes.clone());
        let wire = p.to_wire_value();
        assert_eq!(wire["__binary"], json!(true));
        assert_eq!(wire["encoding"], json!("base64"));
        let back = PayloadValue::from_wire_value(wire).unwrap();
        assert_eq!(back.as_bytes(), Some(bytes.as_slice()));
    }

    #[test]
    fn rejects_unsupported_encoding() {
        let wire = json!({"__binary": true, "encoding": "hex", "data": "ff"});
        assert!(PayloadValue::from_wire_value(wire).is_err());
    }

    #[test]
    fn rejects_invalid_base64() {
        let wire = json!({"__binary": true, "encoding": "base64", "data": "not base64!"});
        assert!(PayloadValue::from_wire_value(wire).is_err());
    }

    #[test]
    fn object_without_binary_marker_is_plain_json() {
        let wire = json!({"encoding": "base64", "data": "x"});
        let p = PayloadValue::from_wire_value(wire.clone()).unwrap();
        assert_eq!(p.as_json(), Some(&wire));
    }

    #[test]
    fn record_serde_roundtrip() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let r = Record::json_now(json!({"x": 1}), now);
        let json_str = serde_json::to_string(&r).unwrap();
        let back: Record = serde_json::from_str(&json_str).unwrap();
        assert_eq!(back, r);
    }
}
