//! Custom scalar conversions for [`FieldMap::field_with`](super::FieldMap::field_with).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

/// Two-way conversion between a JSON value and a field value.
///
/// `from_json` returns `None` when the JSON cannot be converted; the field
/// is then left as it was (or rejected in strict mode).
pub trait Transform {
    type Value;

    fn from_json(&self, value: &JsonValue) -> Option<Self::Value>;

    fn to_json(&self, value: &Self::Value) -> JsonValue;
}

/// Seconds since the Unix epoch, as a number or a numeric string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampTransform;

impl Transform for TimestampTransform {
    type Value = Option<DateTime<Utc>>;

    fn from_json(&self, value: &JsonValue) -> Option<Self::Value> {
        let seconds = match value {
            JsonValue::Null => return Some(None),
            JsonValue::Number(n) => n.as_f64()?,
            JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
        DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).map(Some)
    }

    fn to_json(&self, value: &Self::Value) -> JsonValue {
        match value {
            Some(at) if at.timestamp_subsec_nanos() == 0 => JsonValue::from(at.timestamp()),
            Some(at) => JsonValue::from(at.timestamp_millis() as f64 / 1000.0),
            None => JsonValue::Null,
        }
    }
}

/// RFC 3339 / ISO 8601 date-time strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDateTransform;

impl Transform for IsoDateTransform {
    type Value = Option<DateTime<Utc>>;

    fn from_json(&self, value: &JsonValue) -> Option<Self::Value> {
        match value {
            JsonValue::Null => Some(None),
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|at| Some(at.with_timezone(&Utc))),
            _ => None,
        }
    }

    fn to_json(&self, value: &Self::Value) -> JsonValue {
        match value {
            Some(at) => JsonValue::from(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => JsonValue::Null,
        }
    }
}
