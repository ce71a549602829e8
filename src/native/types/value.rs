//! Decoded values.

use chrono::NaiveDateTime;
use std::fmt;

/// A single decoded column or parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleValue {
    /// NULL value.
    Null,
    /// Number as its exact decimal string.
    /// Can be converted to i64/f64 as needed.
    Number(String),
    /// Date/time value (DATE type).
    Date(NaiveDateTime),
    /// Text value (VARCHAR2, CHAR, LONG, ...).
    Text(String),
}

impl OracleValue {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, OracleValue::Null)
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OracleValue::Text(s) => Some(s),
            OracleValue::Number(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            OracleValue::Number(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            OracleValue::Number(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get the value as a NaiveDateTime.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            OracleValue::Date(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            OracleValue::Null => "null",
            OracleValue::Number(_) => "number",
            OracleValue::Date(_) => "date",
            OracleValue::Text(_) => "text",
        }
    }
}

impl From<i64> for OracleValue {
    fn from(value: i64) -> Self {
        OracleValue::Number(value.to_string())
    }
}

impl From<i32> for OracleValue {
    fn from(value: i32) -> Self {
        OracleValue::Number(value.to_string())
    }
}

impl From<f64> for OracleValue {
    fn from(value: f64) -> Self {
        OracleValue::Number(value.to_string())
    }
}

impl From<&str> for OracleValue {
    fn from(value: &str) -> Self {
        OracleValue::Text(value.to_string())
    }
}

impl From<String> for OracleValue {
    fn from(value: String) -> Self {
        OracleValue::Text(value)
    }
}

impl From<NaiveDateTime> for OracleValue {
    fn from(value: NaiveDateTime) -> Self {
        OracleValue::Date(value)
    }
}

impl<T: Into<OracleValue>> From<Option<T>> for OracleValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(OracleValue::Null, Into::into)
    }
}

impl fmt::Display for OracleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleValue::Null => write!(f, "NULL"),
            OracleValue::Number(n) => write!(f, "{}", n),
            OracleValue::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            OracleValue::Text(s) => write!(f, "{}", s),
        }
    }
}
