//! Typed event records decoded from newline-delimited JSON.
//!
//! Source lines are loosely typed (identifiers may arrive as numbers, a
//! quantity may arrive as `"2"`), so the optional fields use lenient
//! deserializers. A value that cannot be coerced into its column type is
//! treated as absent rather than failing the whole source file.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Timestamp value exactly as it appeared in the source line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Text(String),
    /// Seconds since the Unix epoch.
    EpochSeconds(f64),
    /// Any other JSON type (bool, array, object). Always rejected downstream.
    Other(Value),
}

/// One input event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub search_query: Option<String>,
}

#[derive(Debug, Error)]
pub enum RecordParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

impl EventRecord {
    /// Decode a single NDJSON line.
    ///
    /// The line must hold a JSON object; unknown keys are ignored.
    pub fn from_json_line(line: &str) -> Result<Self, RecordParseError> {
        let value: Value = serde_json::from_str(line)?;
        if !value.is_object() {
            return Err(RecordParseError::NotAnObject(json_kind(&value)));
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_purchase_event() {
        let line = r#"{"timestamp":"2024-03-15T14:22:05Z","user_id":"u1","event_type":"purchase","product_id":"p9","quantity":2,"price":19.99,"category":"toys"}"#;
        let record = EventRecord::from_json_line(line).unwrap();

        assert_eq!(
            record.timestamp,
            Some(RawTimestamp::Text("2024-03-15T14:22:05Z".to_string()))
        );
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.quantity, Some(2));
        assert_eq!(record.price, Some(19.99));
        assert_eq!(record.session_id, None);
        assert_eq!(record.search_query, None);
    }

    #[test]
    fn unknown_fields_are_ignored_and_nulls_are_absent() {
        let line = r#"{"timestamp":null,"bytes_str":"x","session_id":null,"extra":{"a":1}}"#;
        let record = EventRecord::from_json_line(line).unwrap();
        assert_eq!(record, EventRecord::default());
    }

    #[test]
    fn numeric_identifiers_become_strings() {
        let record = EventRecord::from_json_line(r#"{"user_id":42,"product_id":7.5}"#).unwrap();
        assert_eq!(record.user_id.as_deref(), Some("42"));
        assert_eq!(record.product_id.as_deref(), Some("7.5"));
    }

    #[test]
    fn numeric_columns_are_coerced_or_dropped() {
        let record =
            EventRecord::from_json_line(r#"{"quantity":"3","price":"4.50"}"#).unwrap();
        assert_eq!(record.quantity, Some(3));
        assert_eq!(record.price, Some(4.5));

        let record = EventRecord::from_json_line(r#"{"quantity":2.0,"price":true}"#).unwrap();
        assert_eq!(record.quantity, Some(2));
        assert_eq!(record.price, None);

        let record = EventRecord::from_json_line(r#"{"quantity":"many"}"#).unwrap();
        assert_eq!(record.quantity, None);
    }

    #[test]
    fn epoch_and_odd_timestamps_are_kept_raw() {
        let record = EventRecord::from_json_line(r#"{"timestamp":1710512525}"#).unwrap();
        assert_eq!(
            record.timestamp,
            Some(RawTimestamp::EpochSeconds(1_710_512_525.0))
        );

        let record = EventRecord::from_json_line(r#"{"timestamp":true}"#).unwrap();
        assert!(matches!(record.timestamp, Some(RawTimestamp::Other(_))));
    }

    #[test]
    fn rejects_malformed_and_non_object_lines() {
        assert!(matches!(
            EventRecord::from_json_line(r#"{"timestamp": "#),
            Err(RecordParseError::Json(_))
        ));
        assert!(matches!(
            EventRecord::from_json_line("[1, 2]"),
            Err(RecordParseError::NotAnObject("an array"))
        ));
    }
}
