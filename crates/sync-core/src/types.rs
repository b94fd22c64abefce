//! Column type registry.
//!
//! This module defines `ColumnType`, the closed set of column types a table
//! definition may declare. Declarative definitions name their types with
//! strings (`"Integer"`, `"String"`, ...); [`resolve`] is the single place
//! where those names are accepted or rejected.

use crate::error::UnknownTypeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Column type of a synthesized table.
///
/// # JSON Format
///
/// Types are spelled the way table definition files spell them:
/// ```json
/// { "name": "ID", "type": "String", "length": 20 }
/// { "name": "CREATED", "type": "DateTime" }
/// ```
///
/// `DateTime` is accepted as an alias of `Timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 64-bit signed integer
    Integer,

    /// Character string, optionally bounded by the column length
    String,

    /// 64-bit floating point
    Float,

    /// Boolean
    Boolean,

    /// Instant in time, stored as UTC
    Timestamp,
}

impl ColumnType {
    /// Every recognized type, in declaration order.
    pub const ALL: [ColumnType; 5] = [
        ColumnType::Integer,
        ColumnType::String,
        ColumnType::Float,
        ColumnType::Boolean,
        ColumnType::Timestamp,
    ];

    /// Canonical name used in definition files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::String => "String",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Timestamp => "Timestamp",
        }
    }

    /// Whether a declared `length` has any effect on this type.
    pub fn supports_length(&self) -> bool {
        matches!(self, Self::String)
    }
}

/// Resolve a declared type name into a [`ColumnType`].
///
/// Matching is exact. `DateTime` resolves to [`ColumnType::Timestamp`].
pub fn resolve(type_name: &str) -> Result<ColumnType, UnknownTypeError> {
    match type_name {
        "Integer" => Ok(ColumnType::Integer),
        "String" => Ok(ColumnType::String),
        "Float" => Ok(ColumnType::Float),
        "Boolean" => Ok(ColumnType::Boolean),
        "Timestamp" | "DateTime" => Ok(ColumnType::Timestamp),
        other => Err(UnknownTypeError {
            type_name: other.to_string(),
        }),
    }
}

impl FromStr for ColumnType {
    type Err = UnknownTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        resolve(&name).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_types() {
        assert_eq!(resolve("Integer").unwrap(), ColumnType::Integer);
        assert_eq!(resolve("String").unwrap(), ColumnType::String);
        assert_eq!(resolve("Float").unwrap(), ColumnType::Float);
        assert_eq!(resolve("Boolean").unwrap(), ColumnType::Boolean);
        assert_eq!(resolve("Timestamp").unwrap(), ColumnType::Timestamp);
    }

    #[test]
    fn test_resolve_datetime_alias() {
        assert_eq!(resolve("DateTime").unwrap(), ColumnType::Timestamp);
    }

    #[test]
    fn test_resolve_rejects_unknown_types() {
        for name in ["Text", "integer", "VARCHAR", "", "Date", "Numeric"] {
            let err = resolve(name).unwrap_err();
            assert_eq!(err.type_name, name);
        }
    }

    #[test]
    fn test_unknown_type_message_lists_valid_names() {
        let msg = resolve("Blob").unwrap_err().to_string();
        assert!(msg.contains("'Blob'"));
        for ty in ColumnType::ALL {
            assert!(msg.contains(ty.as_str()), "missing {ty} in: {msg}");
        }
    }

    #[test]
    fn test_canonical_name_roundtrips_through_resolve() {
        for ty in ColumnType::ALL {
            assert_eq!(resolve(ty.as_str()).unwrap(), ty);
            assert_eq!(ty.to_string().parse::<ColumnType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_serde_uses_definition_names() {
        let ty: ColumnType = serde_json::from_str("\"DateTime\"").unwrap();
        assert_eq!(ty, ColumnType::Timestamp);
        assert_eq!(
            serde_json::to_string(&ColumnType::Timestamp).unwrap(),
            "\"Timestamp\""
        );
        assert!(serde_json::from_str::<ColumnType>("\"Json\"").is_err());
    }

    #[test]
    fn test_only_string_supports_length() {
        assert!(ColumnType::String.supports_length());
        assert!(!ColumnType::Integer.supports_length());
        assert!(!ColumnType::Timestamp.supports_length());
    }
}
