//! Database values
//!
//! [`DatabaseValue`] is the single currency for bound parameters, decoded
//! row cells and entity attributes.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

/// Storage format for datetimes written by the ORM
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A scalar value travelling to or from the database
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Json(JsonValue),
}

impl DatabaseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int64(v) => Some(*v),
            DatabaseValue::Bool(v) => Some(i64::from(*v)),
            DatabaseValue::Float64(v) if v.fract() == 0.0 => Some(*v as i64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Json(JsonValue::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DatabaseValue::Float64(v) => Some(*v),
            DatabaseValue::Int64(v) => Some(*v as f64),
            DatabaseValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Json(JsonValue::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(v) => Some(*v),
            DatabaseValue::Int64(v) => Some(*v != 0),
            DatabaseValue::Float64(v) => Some(*v != 0.0),
            DatabaseValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            DatabaseValue::Json(JsonValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value for export
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int64(i) => JsonValue::Number((*i).into()),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.format(DATETIME_FORMAT).to_string()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }

    /// Create from a JSON value. Arrays and objects stay structured.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => DatabaseValue::Int64(i),
                None => DatabaseValue::Float64(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => DatabaseValue::String(s),
            other => DatabaseValue::Json(other),
        }
    }

    /// Canonical string form used to match keys across rows.
    ///
    /// `1`, `1.0` and `"1"` all map to `"1"`; `Null` has no key.
    pub fn key_string(&self) -> Option<String> {
        match self {
            DatabaseValue::Null => None,
            DatabaseValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            DatabaseValue::Int64(i) => Some(i.to_string()),
            DatabaseValue::Float64(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some((*f as i64).to_string())
            }
            DatabaseValue::Float64(f) => Some(f.to_string()),
            DatabaseValue::String(s) => Some(s.clone()),
            DatabaseValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            DatabaseValue::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
            DatabaseValue::Json(j) => Some(j.to_string()),
        }
    }
}

impl Default for DatabaseValue {
    fn default() -> Self {
        DatabaseValue::Null
    }
}

impl fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_string() {
            Some(s) => f.write_str(&s),
            None => f.write_str("NULL"),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int64(i64::from(value))
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<u32> for DatabaseValue {
    fn from(value: u32) -> Self {
        DatabaseValue::Int64(i64::from(value))
    }
}

impl From<f32> for DatabaseValue {
    fn from(value: f32) -> Self {
        DatabaseValue::Float64(f64::from(value))
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&String> for DatabaseValue {
    fn from(value: &String) -> Self {
        DatabaseValue::String(value.clone())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<NaiveDateTime> for DatabaseValue {
    fn from(value: NaiveDateTime) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<NaiveDate> for DatabaseValue {
    fn from(value: NaiveDate) -> Self {
        DatabaseValue::String(value.format("%Y-%m-%d").to_string())
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value.naive_utc())
    }
}

/// Scalars map to scalar variants; arrays and objects stay `Json`
impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::from_json(value)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_string_normalizes_numbers() {
        assert_eq!(DatabaseValue::Int64(7).key_string().as_deref(), Some("7"));
        assert_eq!(DatabaseValue::Float64(7.0).key_string().as_deref(), Some("7"));
        assert_eq!(DatabaseValue::from("7").key_string().as_deref(), Some("7"));
        assert_eq!(DatabaseValue::Null.key_string(), None);
    }

    #[test]
    fn test_loose_accessors() {
        assert_eq!(DatabaseValue::from("42").as_i64(), Some(42));
        assert_eq!(DatabaseValue::Int64(0).as_bool(), Some(false));
        assert_eq!(DatabaseValue::from("true").as_bool(), Some(true));
        assert_eq!(DatabaseValue::from("maybe").as_bool(), None);
        assert_eq!(DatabaseValue::Int64(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(DatabaseValue::from_json(json!(5)), DatabaseValue::Int64(5));
        assert_eq!(DatabaseValue::from_json(json!(1.5)), DatabaseValue::Float64(1.5));
        assert_eq!(
            DatabaseValue::from_json(json!(["a"])),
            DatabaseValue::Json(json!(["a"]))
        );
        assert_eq!(DatabaseValue::Bool(true).to_json(), json!(true));
        assert_eq!(DatabaseValue::from(json!("Ann")), DatabaseValue::from("Ann"));
    }

    #[test]
    fn test_datetime_export_format() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(8, 5, 0))
            .unwrap();
        assert_eq!(DatabaseValue::from(dt).to_json(), json!("2024-03-09 08:05:00"));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(DatabaseValue::from(None::<i64>), DatabaseValue::Null);
        assert_eq!(DatabaseValue::from(Some("x")), DatabaseValue::from("x"));
    }
}
