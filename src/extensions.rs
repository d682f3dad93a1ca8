//! Typed side-channel values attached to tickets, profiles and matches
//!
//! Records carry attributes outside their fixed schema through an extension
//! map. Every value is a self-describing envelope, and reads are decoded by
//! the expected variant. A missing key or a variant mismatch never fails the
//! caller; it resolves to a sentinel instead.

use crate::error::{MatchmakingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel returned by [`get_text`] when a key is absent
pub const NOT_ASSIGNED: &str = "not_assigned";

/// Sentinel returned by [`get_text`] when the key holds a number
pub const INVALID_PARSE: &str = "invalid_parse";

/// A single extension value.
///
/// Non-finite numbers are encoded as the strings `"inf"`, `"-inf"` and
/// `"nan"`, since JSON has no literal for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ExtensionValue {
    Number(#[serde(with = "number_repr")] f64),
    Text(String),
}

mod number_repr {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    const POS_INF: &str = "inf";
    const NEG_INF: &str = "-inf";
    const NAN: &str = "nan";

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_sign_positive() {
            serializer.serialize_str(POS_INF)
        } else {
            serializer.serialize_str(NEG_INF)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(NumberVisitor)
    }

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            match value {
                POS_INF => Ok(f64::INFINITY),
                NEG_INF => Ok(f64::NEG_INFINITY),
                NAN => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

impl From<f64> for ExtensionValue {
    fn from(value: f64) -> Self {
        ExtensionValue::Number(value)
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        ExtensionValue::Text(value.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        ExtensionValue::Text(value)
    }
}

impl ExtensionValue {
    /// Encode the envelope as JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to encode extension value: {}", e),
            }
            .into()
        })
    }

    /// Decode an envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to decode extension value: {}", e),
            }
            .into()
        })
    }
}

/// Extension map keyed by string
pub type Extensions = HashMap<String, ExtensionValue>;

/// Store a numeric value under `key`, replacing any previous value
pub fn add_number(extensions: &mut Extensions, key: &str, value: f64) {
    extensions.insert(key.to_string(), ExtensionValue::Number(value));
}

/// Store a string value under `key`, replacing any previous value
pub fn add_text(extensions: &mut Extensions, key: &str, value: &str) {
    extensions.insert(key.to_string(), ExtensionValue::Text(value.to_string()));
}

/// Read a numeric value; negative infinity when absent or not a number
pub fn get_number(extensions: &Extensions, key: &str) -> f64 {
    match extensions.get(key) {
        Some(ExtensionValue::Number(value)) => *value,
        _ => f64::NEG_INFINITY,
    }
}

/// Read a string value; [`NOT_ASSIGNED`] when absent, [`INVALID_PARSE`] when
/// the key holds a number
pub fn get_text(extensions: &Extensions, key: &str) -> String {
    match extensions.get(key) {
        Some(ExtensionValue::Text(value)) => value.clone(),
        Some(ExtensionValue::Number(_)) => INVALID_PARSE.to_string(),
        None => NOT_ASSIGNED.to_string(),
    }
}

/// Whether a decoded string is one of the "absent" sentinels
pub fn is_sentinel(value: &str) -> bool {
    value == NOT_ASSIGNED || value == INVALID_PARSE
}
