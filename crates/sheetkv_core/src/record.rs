//! Records and typed value accessors.

use crate::value::{parse_timestamp, Timestamp, Value};
use std::collections::BTreeMap;

/// Row key type. The key of a record is its row number in the backing store.
pub type Key = u32;

/// Row 1 holds the column names, so data rows start here.
pub const MIN_KEY: Key = 2;

/// A typed key-value bag stored at one row of the backing store.
///
/// Accessors never fail: a missing column or an unconvertible value yields
/// the caller's default. Setters always store the canonical form, so a list
/// written with [`Record::set_strings`] is read back from a backing store
/// as the same comma-joined text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// Row number (>= 2).
    pub key: Key,
    /// Column name to value.
    pub values: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record at the given row.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with_value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Returns the raw value of a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Stores a raw value, returning the previous one.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(column.into(), value.into())
    }

    /// Removes a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Column names present on this record, in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns true if the record holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value as a string.
    pub fn get_as_string(&self, column: &str, default: &str) -> String {
        match self.values.get(column) {
            Some(value) => value.to_text(),
            None => default.to_string(),
        }
    }

    /// Returns the value as an i64. Floats are truncated toward zero.
    pub fn get_as_i64(&self, column: &str, default: i64) -> i64 {
        match self.values.get(column) {
            Some(Value::Integer(i)) => *i,
            Some(Value::Float(f)) => f.trunc() as i64,
            Some(Value::Text(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Returns the value as an f64.
    pub fn get_as_f64(&self, column: &str, default: f64) -> f64 {
        match self.values.get(column) {
            Some(Value::Float(f)) => *f,
            Some(Value::Integer(i)) => *i as f64,
            Some(Value::Text(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Returns the value as a list of strings.
    ///
    /// Text is split on commas; an empty string yields an empty list.
    pub fn get_as_strings(&self, column: &str, default: &[String]) -> Vec<String> {
        match self.values.get(column) {
            Some(Value::List(items)) => items.clone(),
            Some(Value::Text(s)) if s.is_empty() => Vec::new(),
            Some(Value::Text(s)) => s.split(',').map(str::to_string).collect(),
            _ => default.to_vec(),
        }
    }

    /// Returns the value as a bool.
    ///
    /// Only the strings `"true"` and `"1"` are true; numbers are true when
    /// nonzero.
    pub fn get_as_bool(&self, column: &str, default: bool) -> bool {
        match self.values.get(column) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Text(s)) => s == "true" || s == "1",
            Some(Value::Integer(i)) => *i != 0,
            Some(Value::Float(f)) => *f != 0.0,
            _ => default,
        }
    }

    /// Returns the value as a timestamp.
    pub fn get_as_time(&self, column: &str, default: Timestamp) -> Timestamp {
        match self.values.get(column) {
            Some(Value::Timestamp(t)) => *t,
            Some(Value::Text(s)) => parse_timestamp(s).unwrap_or(default),
            _ => default,
        }
    }

    /// Sets a string value.
    pub fn set_string(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), Value::Text(value.into()));
    }

    /// Sets an i64 value.
    pub fn set_i64(&mut self, column: impl Into<String>, value: i64) {
        self.values.insert(column.into(), Value::Integer(value));
    }

    /// Sets an f64 value.
    pub fn set_f64(&mut self, column: impl Into<String>, value: f64) {
        self.values.insert(column.into(), Value::Float(value));
    }

    /// Sets a list of strings, stored as comma-joined text.
    pub fn set_strings<S: AsRef<str>>(&mut self, column: impl Into<String>, value: &[S]) {
        let joined = value.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
        self.values.insert(column.into(), Value::Text(joined));
    }

    /// Sets a bool value.
    pub fn set_bool(&mut self, column: impl Into<String>, value: bool) {
        self.values.insert(column.into(), Value::Bool(value));
    }

    /// Sets a timestamp, stored as RFC-3339 text.
    pub fn set_time(&mut self, column: impl Into<String>, value: Timestamp) {
        self.values
            .insert(column.into(), Value::Text(value.to_rfc3339()));
    }
}
