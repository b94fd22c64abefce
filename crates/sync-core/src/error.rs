//! Error types for definition synthesis and row construction.

use crate::types::ColumnType;

/// A declared column type is not one of the recognized types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Unknown column type '{type_name}': expected one of Integer, String, Float, Boolean, Timestamp (or DateTime)"
)]
pub struct UnknownTypeError {
    /// The rejected type name, as written in the definition
    pub type_name: String,
}

/// A raw table definition document is malformed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableDefinitionError {
    /// The document is not a JSON object
    #[error("Table definition must be a JSON object")]
    NotAnObject,

    /// A required top-level key is missing
    #[error("Table definition is missing required key '{0}'")]
    MissingKey(&'static str),

    /// A top-level key holds a value of the wrong shape
    #[error("Table definition key '{key}' must be {expected}")]
    WrongShape {
        key: &'static str,
        expected: &'static str,
    },

    /// A required column key is missing
    #[error("Column {index} of table '{table}' is missing required key '{key}'")]
    MissingColumnKey {
        table: String,
        index: usize,
        key: &'static str,
    },

    /// A column key holds a value of the wrong shape
    #[error("Column {index} of table '{table}': key '{key}' must be {expected}")]
    WrongColumnShape {
        table: String,
        index: usize,
        key: &'static str,
        expected: &'static str,
    },

    /// A column declares a type rejected by the type registry
    #[error("Column '{column}' of table '{table}' has an unsupported type")]
    UnknownType {
        table: String,
        column: String,
        #[source]
        source: UnknownTypeError,
    },
}

/// Reason a [`SchemaGenerationError`] was raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaCause {
    #[error("table declares no columns")]
    NoColumns,

    #[error("column {index} has an empty name")]
    EmptyColumnName { index: usize },

    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("column '{column}' has invalid length {length}: expected 1..=65535")]
    InvalidLength { column: String, length: i64 },

    #[error("more than one primary key column: {}", .0.join(", "))]
    MultiplePrimaryKeys(Vec<String>),
}

/// A table definition could not be turned into a runtime schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to generate schema for table '{table}'")]
pub struct SchemaGenerationError {
    /// Table whose schema failed
    pub table: String,

    /// Underlying cause
    #[source]
    pub cause: SchemaCause,
}

/// Any failure while synthesizing a table from its declarative definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Table(#[from] TableDefinitionError),

    #[error(transparent)]
    Schema(#[from] SchemaGenerationError),

    /// A table with the same name is already registered
    #[error("Table '{0}' is defined more than once")]
    DuplicateTable(String),
}

/// A raw object-to-table mapping document is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingValidationError {
    /// The document is not a JSON object
    #[error("Mapping must be a JSON object")]
    NotAnObject,

    /// A key holds a value of the wrong shape
    #[error("Mapping key '{key}' must be {expected}")]
    WrongShape {
        key: &'static str,
        expected: &'static str,
    },

    /// A required name is missing or empty (strict mode)
    #[error("Mapping key '{0}' must be a non-empty string")]
    EmptyName(&'static str),

    /// `column-mapping` has no entries
    #[error("At least one field to column mapping must be specified")]
    NoColumnMappings,

    /// A source field name is empty
    #[error("Mapping for source object '{object}' contains an empty source field name")]
    EmptySourceField { object: String },

    /// A destination column is empty or not a string
    #[error("Source field '{field}' must map to a non-empty column name")]
    InvalidDestinationColumn { field: String },
}

/// A target row does not fit its table schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("Row for table '{actual}' cannot be built with schema of table '{expected}'")]
    WrongTable { expected: String, actual: String },

    #[error("Table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("Primary key column '{column}' of table '{table}' must not be null")]
    NullPrimaryKey { table: String, column: String },

    #[error("Column '{column}' of table '{table}' expects {expected}, got {value}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: ColumnType,
        value: String,
    },

    #[error("Value for column '{column}' of table '{table}' is {length} characters, exceeding the limit of {max}")]
    TooLong {
        table: String,
        column: String,
        length: usize,
        max: u16,
    },
}
