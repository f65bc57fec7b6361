//! Attribute storage, dirty tracking and casts
//!
//! Raw values are stored exactly as they travel to the database. Writes
//! normalize to storage form, casts run on read, and dirty diffing compares
//! raw values only.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::backends::{DatabaseValue, Row, DATETIME_FORMAT};
use crate::error::{ModelError, ModelResult};

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Int,
    Float,
    Bool,
    String,
    /// Stored as JSON text, read back as structured JSON
    Json,
    DateTime,
}

/// Current and last-persisted attribute values of one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    attributes: IndexMap<String, DatabaseValue>,
    original: IndexMap<String, DatabaseValue>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate from a storage row; nothing is dirty afterwards
    pub fn from_row(row: Row) -> Self {
        Self {
            original: row.clone(),
            attributes: row,
        }
    }

    pub fn raw(&self, column: &str) -> Option<&DatabaseValue> {
        self.attributes.get(column)
    }

    pub fn set_raw(&mut self, column: &str, value: DatabaseValue) {
        self.attributes.insert(column.to_string(), value);
    }

    pub fn remove(&mut self, column: &str) -> Option<DatabaseValue> {
        self.attributes.shift_remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.attributes.contains_key(column)
    }

    pub fn attributes(&self) -> &IndexMap<String, DatabaseValue> {
        &self.attributes
    }

    pub fn original(&self) -> &IndexMap<String, DatabaseValue> {
        &self.original
    }

    /// Columns absent from the snapshot or holding a different raw value
    pub fn dirty(&self) -> IndexMap<String, DatabaseValue> {
        self.attributes
            .iter()
            .filter(|(column, value)| self.original.get(*column) != Some(*value))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes
            .iter()
            .any(|(column, value)| self.original.get(column) != Some(value))
    }

    pub fn is_column_dirty(&self, column: &str) -> bool {
        match self.attributes.get(column) {
            Some(value) => self.original.get(column) != Some(value),
            None => false,
        }
    }

    /// Snapshot every current value as persisted
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    /// Snapshot only the given columns as persisted
    pub fn sync_columns<'a, I>(&mut self, columns: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for column in columns {
            if let Some(value) = self.attributes.get(column) {
                self.original.insert(column.clone(), value.clone());
            }
        }
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
        self.original.clear();
    }
}

/// Apply `cast` to a raw stored value. `Null` always reads as `Null`.
pub fn cast_value(column: &str, cast: CastType, raw: &DatabaseValue) -> ModelResult<DatabaseValue> {
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let failed = |target: &str| {
        ModelError::cast(column, format!("cannot convert {:?} to {}", raw, target))
    };

    match cast {
        CastType::Int => raw.as_i64().map(DatabaseValue::Int64).ok_or_else(|| failed("int")),
        CastType::Float => raw
            .as_f64()
            .map(DatabaseValue::Float64)
            .ok_or_else(|| failed("float")),
        CastType::Bool => raw.as_bool().map(DatabaseValue::Bool).ok_or_else(|| failed("bool")),
        CastType::String => Ok(match raw {
            DatabaseValue::String(s) => DatabaseValue::String(s.clone()),
            other => DatabaseValue::String(other.key_string().unwrap_or_default()),
        }),
        CastType::Json => match raw {
            DatabaseValue::String(text) => serde_json::from_str::<JsonValue>(text)
                .map(DatabaseValue::Json)
                .map_err(|e| ModelError::cast(column, format!("invalid JSON: {}", e))),
            DatabaseValue::Bytes(bytes) => serde_json::from_slice::<JsonValue>(bytes)
                .map(DatabaseValue::Json)
                .map_err(|e| ModelError::cast(column, format!("invalid JSON: {}", e))),
            DatabaseValue::Json(value) => Ok(DatabaseValue::Json(value.clone())),
            other => Ok(DatabaseValue::Json(other.to_json())),
        },
        CastType::DateTime => match raw {
            DatabaseValue::DateTime(dt) => Ok(DatabaseValue::DateTime(*dt)),
            DatabaseValue::String(text) => parse_datetime(text)
                .map(DatabaseValue::DateTime)
                .ok_or_else(|| ModelError::cast(column, format!("unparseable datetime '{}'", text))),
            DatabaseValue::Int64(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|dt| DatabaseValue::DateTime(dt.naive_utc()))
                .ok_or_else(|| failed("datetime")),
            _ => Err(failed("datetime")),
        },
    }
}

/// Convert a written value to the form it will read back from storage,
/// so re-assigning an unchanged value leaves the column clean. Values a
/// cast cannot convert are kept as given and fail on read.
pub fn storage_form(cast: Option<CastType>, value: DatabaseValue) -> DatabaseValue {
    let Some(cast) = cast else {
        return value;
    };
    if value.is_null() {
        return value;
    }

    let converted = match (cast, &value) {
        (CastType::Int, _) => value.as_i64().map(DatabaseValue::Int64),
        (CastType::Float, _) => value.as_f64().map(DatabaseValue::Float64),
        (CastType::Bool, _) => value
            .as_bool()
            .map(|flag| DatabaseValue::Int64(i64::from(flag))),
        (CastType::String, DatabaseValue::Bytes(_)) => None,
        (CastType::String, _) => value.key_string().map(DatabaseValue::String),
        (CastType::Json, DatabaseValue::Json(json)) => Some(DatabaseValue::String(json.to_string())),
        (CastType::Json, _) => None,
        (CastType::DateTime, DatabaseValue::DateTime(dt)) => {
            Some(DatabaseValue::String(dt.format(DATETIME_FORMAT).to_string()))
        }
        (CastType::DateTime, DatabaseValue::String(text)) => parse_datetime(text)
            .map(|dt| DatabaseValue::String(dt.format(DATETIME_FORMAT).to_string())),
        (CastType::DateTime, _) => None,
    };
    converted.unwrap_or(value)
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Current time in storage form
pub(crate) fn now_value() -> DatabaseValue {
    DatabaseValue::String(chrono::Utc::now().naive_utc().format(DATETIME_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dt(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn test_dirty_tracking_compares_raw_values() {
        let mut row = Row::new();
        row.insert("id".to_string(), DatabaseValue::Int64(1));
        row.insert("name".to_string(), DatabaseValue::from("Ann"));
        let mut store = AttributeStore::from_row(row);
        assert!(!store.is_dirty());

        store.set_raw("name", DatabaseValue::from("Ann"));
        assert!(!store.is_dirty());

        store.set_raw("name", DatabaseValue::from("Bob"));
        store.set_raw("email", DatabaseValue::from("b@x.io"));
        let dirty = store.dirty();
        assert_eq!(dirty.keys().collect::<Vec<_>>(), ["name", "email"]);
        assert!(store.is_column_dirty("name"));
        assert!(!store.is_column_dirty("id"));

        store.sync_columns(["name".to_string()].iter());
        assert_eq!(store.dirty().len(), 1);
        store.sync_original();
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_scalar_casts() {
        assert_eq!(
            cast_value("n", CastType::Int, &DatabaseValue::from("42")).unwrap(),
            DatabaseValue::Int64(42)
        );
        assert_eq!(
            cast_value("n", CastType::Float, &DatabaseValue::Int64(2)).unwrap(),
            DatabaseValue::Float64(2.0)
        );
        assert_eq!(
            cast_value("b", CastType::Bool, &DatabaseValue::Int64(1)).unwrap(),
            DatabaseValue::Bool(true)
        );
        assert_eq!(
            cast_value("s", CastType::String, &DatabaseValue::Int64(7)).unwrap(),
            DatabaseValue::from("7")
        );
        assert!(cast_value("n", CastType::Int, &DatabaseValue::from("abc")).is_err());
    }

    #[test]
    fn test_null_is_never_cast() {
        for cast in [CastType::Int, CastType::Json, CastType::DateTime] {
            assert_eq!(
                cast_value("c", cast, &DatabaseValue::Null).unwrap(),
                DatabaseValue::Null
            );
        }
    }

    #[test]
    fn test_json_round_trip() {
        let stored = storage_form(Some(CastType::Json), DatabaseValue::Json(json!({"a": [1, 2]})));
        assert!(matches!(stored, DatabaseValue::String(_)));
        assert_eq!(
            cast_value("meta", CastType::Json, &stored).unwrap(),
            DatabaseValue::Json(json!({"a": [1, 2]}))
        );
        // reading twice never double-decodes
        let again = cast_value("meta", CastType::Json, &stored).unwrap();
        assert_eq!(again, DatabaseValue::Json(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_invalid_json_is_cast_error() {
        let err = cast_value("meta", CastType::Json, &DatabaseValue::from("{oops")).unwrap_err();
        assert!(matches!(err, ModelError::Cast { ref column, .. } if column == "meta"));
    }

    #[test]
    fn test_datetime_round_trip_and_formats() {
        let value = dt("2024-02-29 13:45:00");
        let stored = storage_form(Some(CastType::DateTime), DatabaseValue::DateTime(value));
        assert_eq!(stored, DatabaseValue::from("2024-02-29 13:45:00"));
        assert_eq!(
            cast_value("at", CastType::DateTime, &stored).unwrap(),
            DatabaseValue::DateTime(value)
        );

        for text in ["2024-02-29T13:45:00", "2024-02-29T13:45:00Z", "2024-02-29 13:45:00.000"] {
            assert_eq!(
                cast_value("at", CastType::DateTime, &DatabaseValue::from(text)).unwrap(),
                DatabaseValue::DateTime(value),
                "{}",
                text
            );
        }
        assert_eq!(
            cast_value("at", CastType::DateTime, &DatabaseValue::from("2024-02-29")).unwrap(),
            DatabaseValue::DateTime(dt("2024-02-29 00:00:00"))
        );
    }

    #[test]
    fn test_unparseable_datetime_is_cast_error() {
        let err = cast_value("at", CastType::DateTime, &DatabaseValue::from("yesterday"));
        assert!(matches!(err, Err(ModelError::Cast { .. })));
    }

    #[test]
    fn test_storage_form_matches_what_storage_returns() {
        assert_eq!(
            storage_form(Some(CastType::Int), DatabaseValue::from("30")),
            DatabaseValue::Int64(30)
        );
        assert_eq!(
            storage_form(Some(CastType::Bool), DatabaseValue::Bool(false)),
            DatabaseValue::Int64(0)
        );
        assert_eq!(
            storage_form(Some(CastType::Float), DatabaseValue::Int64(2)),
            DatabaseValue::Float64(2.0)
        );
        assert_eq!(
            storage_form(Some(CastType::String), DatabaseValue::Int64(7)),
            DatabaseValue::from("7")
        );
        assert_eq!(
            storage_form(Some(CastType::DateTime), DatabaseValue::from("2024-02-29T13:45:00")),
            DatabaseValue::from("2024-02-29 13:45:00")
        );
    }

    #[test]
    fn test_storage_form_leaves_other_values() {
        assert_eq!(
            storage_form(Some(CastType::Int), DatabaseValue::from("abc")),
            DatabaseValue::from("abc")
        );
        assert_eq!(
            storage_form(Some(CastType::Bool), DatabaseValue::Null),
            DatabaseValue::Null
        );
        assert_eq!(
            storage_form(None, DatabaseValue::Json(json!([1]))),
            DatabaseValue::Json(json!([1]))
        );
    }
}
