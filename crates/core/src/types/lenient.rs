//! Forgiving field deserializers
//!
//! Optional wire fields are read as a `serde_json::Value` first. A null, or a
//! value of the wrong type, becomes `None` (or empty) instead of failing the
//! whole payload.

use super::BookMetadata;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn optional_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(string_of(Value::deserialize(d)?))
}

pub(crate) fn optional_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(u64_of(&Value::deserialize(d)?))
}

pub(crate) fn optional_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(u64_of(&Value::deserialize(d)?).and_then(|n| u32::try_from(n).ok()))
}

/// Counts default to zero
pub(crate) fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(optional_u32(d)?.unwrap_or(0))
}

pub(crate) fn optional_f32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f32>, D::Error> {
    let number = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()).map(|n| n as f32))
}

/// A single string is taken as a one-element list; non-string entries are dropped
pub(crate) fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.into_iter().filter_map(string_of).collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

/// Epoch milliseconds are rendered as RFC 3339
pub(crate) fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(|ts| ts.to_rfc3339()),
        _ => None,
    })
}

pub(crate) fn metadata<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BookMetadata>, D::Error> {
    Ok(match Value::deserialize(d)? {
        value @ Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

fn string_of(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn u64_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Fields {
        #[serde(deserialize_with = "optional_string")]
        name: Option<String>,
        #[serde(deserialize_with = "optional_u64")]
        id: Option<u64>,
        #[serde(deserialize_with = "count")]
        pending: u32,
        #[serde(deserialize_with = "strings")]
        tags: Vec<String>,
        #[serde(deserialize_with = "timestamp")]
        at: Option<String>,
    }

    fn parse(json: &str) -> Fields {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_nulls_become_defaults() {
        let p = parse(r#"{"name":null,"id":null,"pending":null,"tags":null,"at":null}"#);
        assert!(p.name.is_none());
        assert!(p.id.is_none());
        assert_eq!(p.pending, 0);
        assert!(p.tags.is_empty());
        assert!(p.at.is_none());
    }

    #[test]
    fn test_wrong_types_are_dropped_or_coerced() {
        let p = parse(r#"{"name":7,"id":"42","pending":-3,"tags":["a",1,null],"at":true}"#);
        assert_eq!(p.name.as_deref(), Some("7"));
        assert_eq!(p.id, Some(42));
        assert_eq!(p.pending, 0);
        assert_eq!(p.tags, vec!["a".to_string(), "1".to_string()]);
        assert!(p.at.is_none());
    }

    #[test]
    fn test_epoch_millis_timestamp() {
        let p = parse(r#"{"at":0}"#);
        assert_eq!(p.at.as_deref(), Some("1970-01-01T00:00:00+00:00"));
    }
}
