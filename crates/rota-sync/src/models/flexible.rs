//! Lenient deserializers for values written by older clients.
//!
//! Remote documents carry ids as numbers or numeric strings and timestamps
//! as epoch milliseconds or RFC 3339 strings. These helpers accept all of
//! those shapes so the typed models stay strict everywhere else.

#![allow(clippy::cast_possible_truncation)]

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read an integer out of a JSON number or numeric string.
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Read epoch milliseconds out of a number, numeric string or RFC 3339 string.
pub fn value_to_millis(value: &Value) -> Option<i64> {
    value_to_i64(value).or_else(|| match value {
        Value::String(text) => chrono::DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.timestamp_millis()),
        _ => None,
    })
}

/// Required record identifier.
pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_i64(&value).ok_or_else(|| D::Error::custom(format!("invalid identifier: {value}")))
}

/// Optional foreign key. `null`, `0` and `""` all mean "no reference".
pub fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        other => value_to_i64(other)
            .map(|id| (id != 0).then_some(id))
            .ok_or_else(|| D::Error::custom(format!("invalid identifier: {value}"))),
    }
}

/// Required timestamp in epoch milliseconds.
pub fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    value_to_millis(&value).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}")))
}

/// Optional timestamp in epoch milliseconds.
pub fn opt_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    value_to_millis(&value)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "id")]
        id: i64,
        #[serde(default, deserialize_with = "opt_id")]
        parent_id: Option<i64>,
        #[serde(default, deserialize_with = "millis")]
        at: i64,
    }

    #[test]
    fn accepts_numeric_strings_and_floats() {
        let sample: Sample =
            serde_json::from_value(json!({"id": "42", "parent_id": 7.0, "at": "1700000000000"}))
                .unwrap();
        assert_eq!(sample.id, 42);
        assert_eq!(sample.parent_id, Some(7));
        assert_eq!(sample.at, 1_700_000_000_000);
    }

    #[test]
    fn zero_foreign_key_means_absent() {
        let sample: Sample = serde_json::from_value(json!({"id": 1, "parent_id": 0})).unwrap();
        assert_eq!(sample.parent_id, None);
    }

    #[test]
    fn parses_rfc3339_timestamps() {
        let sample: Sample =
            serde_json::from_value(json!({"id": 1, "at": "2024-01-02T03:04:05.006Z"})).unwrap();
        assert_eq!(sample.at, 1_704_164_645_006);
    }

    #[test]
    fn rejects_garbage_identifiers() {
        let result = serde_json::from_value::<Sample>(json!({"id": "abc"}));
        assert!(result.is_err());
    }
}
