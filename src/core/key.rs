use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Value of a primary-key field.
///
/// Only strings and integers identify objects; any other JSON kind cannot
/// be used as a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    Text(String),
}

/// Outcome of reading a key out of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KeyProbe {
    Found(PrimaryKey),
    Null,
    Unsupported(JsonValue),
}

impl PrimaryKey {
    pub(crate) fn probe(value: Option<&JsonValue>) -> KeyProbe {
        match value {
            None | Some(JsonValue::Null) => KeyProbe::Null,
            Some(JsonValue::String(s)) => KeyProbe::Found(PrimaryKey::Text(s.clone())),
            Some(JsonValue::Number(n)) => match n.as_i64() {
                Some(i) => KeyProbe::Found(PrimaryKey::Int(i)),
                None => KeyProbe::Unsupported(JsonValue::Number(n.clone())),
            },
            Some(other) => KeyProbe::Unsupported(other.clone()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            PrimaryKey::Int(i) => JsonValue::from(*i),
            PrimaryKey::Text(s) => JsonValue::from(s.as_str()),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(i) => write!(f, "{}", i),
            PrimaryKey::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        PrimaryKey::Int(value)
    }
}

impl From<i32> for PrimaryKey {
    fn from(value: i32) -> Self {
        PrimaryKey::Int(value as i64)
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        PrimaryKey::Text(value.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(value: String) -> Self {
        PrimaryKey::Text(value)
    }
}
