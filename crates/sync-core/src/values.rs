//! Value representations for records moving from the CRM into storage.
//!
//! - [`SourceRecord`] is what the CRM client hands over: loosely-typed JSON.
//! - [`UniversalValue`] is the coerced value model shared by the converter,
//!   the schema row builder and the storage sinks.
//! - [`TargetRow`] is a projected record keyed by destination column names.
//! - [`SchemaRow`] is a target row validated against its table schema.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fmt;

/// A record as returned by the CRM query API, with echo metadata removed.
pub type SourceRecord = serde_json::Map<String, serde_json::Value>;

/// Coerced value.
#[derive(Debug, Clone, PartialEq)]
pub enum UniversalValue {
    /// Null / absent value
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// String value
    Text(String),

    /// Instant normalized to UTC
    Timestamp(DateTime<Utc>),
}

impl UniversalValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as an f64. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a timestamp.
    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for UniversalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "boolean {b}"),
            Self::Int(i) => write!(f, "integer {i}"),
            Self::Float(x) => write!(f, "float {x}"),
            Self::Text(s) => write!(f, "text '{s}'"),
            Self::Timestamp(ts) => write!(f, "timestamp {}", ts.to_rfc3339()),
        }
    }
}

impl From<serde_json::Value> for UniversalValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    // u64 beyond i64 and all non-integers end up here
                    n.as_f64().map(Self::Float).unwrap_or(Self::Null)
                }
            }
            Value::String(s) => Self::Text(s),
            // Compound CRM fields (addresses, geolocations) are kept as JSON text
            other @ (Value::Array(_) | Value::Object(_)) => Self::Text(other.to_string()),
        }
    }
}

impl From<&str> for UniversalValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for UniversalValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for UniversalValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for UniversalValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for UniversalValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<DateTime<Utc>> for UniversalValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl<T: Into<UniversalValue>> From<Option<T>> for UniversalValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// A projected record keyed by destination column names.
///
/// Column order follows the mapping declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    /// Destination table name
    pub table: String,

    /// Column name -> value
    pub values: IndexMap<String, UniversalValue>,
}

impl TargetRow {
    /// Create an empty row for a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: IndexMap::new(),
        }
    }

    /// Add a column value, builder style.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<UniversalValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column value. A repeated column keeps its first position.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<UniversalValue>) {
        self.values.insert(column.into(), value.into());
    }

    /// Get a column value by name.
    pub fn get(&self, column: &str) -> Option<&UniversalValue> {
        self.values.get(column)
    }

    /// Column names in row order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A row validated against a [`crate::TableSchema`].
///
/// Holds exactly one value per schema column, in declared column order.
/// Only [`crate::TableSchema::build_row`] constructs it.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRow {
    table: String,
    values: Vec<(String, UniversalValue)>,
}

impl SchemaRow {
    pub(crate) fn new(table: String, values: Vec<(String, UniversalValue)>) -> Self {
        Self { table, values }
    }

    /// Table this row belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// `(column, value)` pairs in schema column order.
    pub fn values(&self) -> &[(String, UniversalValue)] {
        &self.values
    }

    /// Get a column value by name.
    pub fn get(&self, column: &str) -> Option<&UniversalValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }
}
