//! Values exchanged with catalog statements

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parameter bound to, or a column read from, a catalog statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    /// Catalog flags and type codes
    Int16(i16),
    Int32(i32),
    Int64(i64),
    /// Index statistics
    Float64(f64),
    /// Text, padded with trailing spaces when read from a fixed-width column
    String(String),
    /// Blob content
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(text) = self {
            Some(text)
        } else {
            None
        }
    }

    /// Integer view of any integral value. Numeric text is parsed, since
    /// some catalog columns are declared as CHAR.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(flag) => Some(i64::from(flag)),
            Value::Int16(n) => Some(i64::from(n)),
            Value::Int32(n) => Some(i64::from(n)),
            Value::Int64(n) => Some(n),
            Value::String(ref text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float64(x) => Some(x),
            Value::String(ref text) => text.trim().parse().ok(),
            // i64 -> f64 is lossy above 2^53, far beyond catalog counters
            ref other => other.as_i64().map(|n| n as f64),
        }
    }
}

/// Text form used when a column is read as a string. NULL renders empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Int16(n) => write!(f, "{n}"),
            Value::Int32(n) => write!(f, "{n}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::Float64(x) => write!(f, "{x}"),
            Value::String(text) => f.write_str(text),
            Value::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Int16(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
