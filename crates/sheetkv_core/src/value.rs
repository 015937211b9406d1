//! Dynamic cell value type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

/// Timestamp type used for [`Value::Timestamp`].
pub type Timestamp = DateTime<Utc>;

/// A dynamic cell value.
///
/// `List` and `Timestamp` are logical types: when a row is written to a
/// backing store they become a comma-joined string and an RFC-3339 string
/// respectively (see [`Value::to_cell_string`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text string.
    Text(String),
    /// Signed 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// List of strings.
    List(Vec<String>),
    /// Point in time.
    Timestamp(Timestamp),
}

impl Value {
    /// Returns true for `Integer` and `Float`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Numeric view of the value, if it is `Integer` or `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String form used for display and equality fallbacks.
    ///
    /// Booleans render as `true`/`false`, lists are comma-joined and
    /// timestamps use RFC-3339.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => items.join(","),
            Value::Timestamp(t) => t.to_rfc3339(),
        }
    }

    /// String written into a backing-store cell.
    ///
    /// Same as [`Value::to_text`] except booleans, which use the spreadsheet
    /// spelling `TRUE`/`FALSE`.
    pub fn to_cell_string(&self) -> String {
        match self {
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            other => other.to_text(),
        }
    }

    /// Infers a value from raw cell text.
    ///
    /// Integers are tried first, then floats, then the boolean spellings
    /// `true`/`TRUE`/`false`/`FALSE`; everything else stays text.
    pub fn parse_cell(text: &str) -> Value {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
        match text {
            "true" | "TRUE" => Value::Bool(true),
            "false" | "FALSE" => Value::Bool(false),
            _ => Value::Text(text.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Parses a timestamp in one of the accepted layouts.
///
/// Tried in order: RFC-3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`
/// (the last two are interpreted as UTC).
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}
