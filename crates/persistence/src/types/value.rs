//! Typed field values and rows exchanged with a [`Store`](crate::core::Store).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::PersistenceError;

/// Wire format for timestamps held in text columns.
///
/// Fixed width so that lexical order matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// A single typed column value.
///
/// Every filter value and every written value travels as a `FieldValue` and
/// is bound as a statement parameter by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// SQL NULL.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// 64-bit integer.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Returns true for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Real(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
            FieldValue::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// Parses a timestamp stored by this crate, accepting plain RFC 3339 and
/// space-separated SQL datetimes written by other tools.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// A set of column values keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<&'static str, FieldValue>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value.
    pub fn set(&mut self, column: &'static str, value: impl Into<FieldValue>) {
        self.values.insert(column, value.into());
    }

    /// Builder-style [`Row::set`].
    pub fn with(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Returns the raw value of a column.
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    /// Iterates columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Number of columns present.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no column is present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy of this row restricted to the given columns.
    pub fn project<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Row {
        let mut out = Row::new();
        for column in columns {
            if let Some((name, value)) = self.values.get_key_value(column) {
                out.values.insert(*name, value.clone());
            }
        }
        out
    }

    fn decode_error(column: &str, message: impl Into<String>) -> PersistenceError {
        PersistenceError::Decode {
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// Reads a non-null integer column.
    pub fn integer(&self, column: &str) -> Result<i64, PersistenceError> {
        self.opt_integer(column)?
            .ok_or_else(|| Self::decode_error(column, "unexpected null"))
    }

    /// Reads a nullable integer column.
    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>, PersistenceError> {
        match self.get(column) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Integer(v)) => Ok(Some(*v)),
            Some(FieldValue::Bool(v)) => Ok(Some(i64::from(*v))),
            Some(other) => Err(Self::decode_error(column, format!("expected integer, got {other:?}"))),
        }
    }

    /// Reads a nullable floating point column.
    pub fn opt_real(&self, column: &str) -> Result<Option<f64>, PersistenceError> {
        match self.get(column) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Real(v)) => Ok(Some(*v)),
            Some(FieldValue::Integer(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(Self::decode_error(column, format!("expected real, got {other:?}"))),
        }
    }

    /// Reads a non-null text column.
    pub fn text(&self, column: &str) -> Result<String, PersistenceError> {
        self.opt_text(column)?
            .ok_or_else(|| Self::decode_error(column, "unexpected null"))
    }

    /// Reads a nullable text column.
    pub fn opt_text(&self, column: &str) -> Result<Option<String>, PersistenceError> {
        match self.get(column) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Text(v)) => Ok(Some(v.clone())),
            Some(other) => Err(Self::decode_error(column, format!("expected text, got {other:?}"))),
        }
    }

    /// Reads a boolean column. Null reads as `false`.
    pub fn bool(&self, column: &str) -> Result<bool, PersistenceError> {
        match self.get(column) {
            None | Some(FieldValue::Null) => Ok(false),
            Some(FieldValue::Bool(v)) => Ok(*v),
            Some(FieldValue::Integer(v)) => Ok(*v != 0),
            Some(other) => Err(Self::decode_error(column, format!("expected bool, got {other:?}"))),
        }
    }

    /// Reads a non-null timestamp column.
    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, PersistenceError> {
        self.opt_timestamp(column)?
            .ok_or_else(|| Self::decode_error(column, "unexpected null"))
    }

    /// Reads a nullable timestamp column.
    pub fn opt_timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        match self.get(column) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Timestamp(v)) => Ok(Some(*v)),
            Some(FieldValue::Text(raw)) => parse_timestamp(raw)
                .map(Some)
                .ok_or_else(|| Self::decode_error(column, format!("bad timestamp '{raw}'"))),
            Some(other) => Err(Self::decode_error(column, format!("expected timestamp, got {other:?}"))),
        }
    }
}

impl FromIterator<(&'static str, FieldValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (&'static str, FieldValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_option_into_field_value() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some(4_i64)), FieldValue::Integer(4));
    }

    #[test]
    fn test_row_typed_getters() {
        let row = Row::new()
            .with("id", 7_i64)
            .with("flag", FieldValue::Integer(1))
            .with("name", "aspirin")
            .with("missing", FieldValue::Null);

        assert_eq!(row.integer("id").unwrap(), 7);
        assert!(row.bool("flag").unwrap());
        assert_eq!(row.text("name").unwrap(), "aspirin");
        assert_eq!(row.opt_text("missing").unwrap(), None);
        assert!(row.integer("missing").is_err());
        assert!(row.integer("name").is_err());
    }

    #[test]
    fn test_timestamp_text_is_parsed() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let row = Row::new()
            .with("a", "2024-03-01T08:30:00.000000Z")
            .with("b", "2024-03-01 08:30:00");
        assert_eq!(row.timestamp("a").unwrap(), expected);
        assert_eq!(row.timestamp("b").unwrap(), expected);
    }

    #[test]
    fn test_timestamp_format_sorts_lexically() {
        let early = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = early.format(TIMESTAMP_FORMAT).to_string();
        let b = late.format(TIMESTAMP_FORMAT).to_string();
        assert!(a < b);
    }

    #[test]
    fn test_project_keeps_requested_columns() {
        let row = Row::new().with("a", 1_i64).with("b", 2_i64).with("c", 3_i64);
        let projected = row.project(["a", "c", "z"]);
        assert_eq!(projected.len(), 2);
        assert!(projected.get("b").is_none());
    }
}
