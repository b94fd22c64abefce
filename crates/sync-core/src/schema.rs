//! Table definitions and runtime table schemas.
//!
//! ## Type Hierarchy
//!
//! **Declarative types** (parsed from table definition files):
//! - `ColumnDefinition` - Single column as declared
//! - `TableDefinition` - Table name plus ordered columns
//!
//! **Runtime types** (synthesized, held for the duration of a run):
//! - `Column` - Column with its effective storage type
//! - `TableSchema` - Validated table, able to build rows
//! - `SchemaRegistry` - Name-indexed collection of table schemas
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use sync_core::schema::{synthesize_definition, synthesize_schema};
//! use sync_core::values::TargetRow;
//!
//! let raw = json!({
//!     "tablename": "User",
//!     "columns": [
//!         {"name": "ID", "type": "String", "length": 20, "primary_key": true},
//!         {"name": "NAME", "type": "String", "length": 50}
//!     ]
//! });
//!
//! let schema = synthesize_schema(synthesize_definition(&raw).unwrap()).unwrap();
//! let row = schema
//!     .build_row(&TargetRow::new("User").with("ID", "001").with("NAME", "Acme"))
//!     .unwrap();
//! assert_eq!(row.values().len(), 2);
//! ```

use crate::convert::parse_crm_timestamp;
use crate::error::{
    DefinitionError, RowError, SchemaCause, SchemaGenerationError, TableDefinitionError,
};
use crate::types::{resolve, ColumnType};
use crate::values::{SchemaRow, TargetRow, UniversalValue};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Declarative Types
// ============================================================================

/// Column as declared in a table definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Maximum length; only meaningful for `String`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,

    /// Whether this column is the primary key
    #[serde(default, rename = "primary_key")]
    pub is_primary_key: bool,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            is_primary_key: false,
        }
    }

    /// Set the declared length.
    pub fn with_length(mut self, length: i64) -> Self {
        self.length = Some(length);
        self
    }

    /// Mark the column as primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }
}

/// Table as declared in a table definition file.
///
/// Relationships between tables are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name
    #[serde(rename = "tablename")]
    pub table_name: String,

    /// Columns in declared order
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Create a new table definition.
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }
}

/// Parse a raw table definition document.
///
/// Required keys are `tablename` and `columns`; each column requires `name`
/// and `type`, and may carry `length` and `primary_key`. Other keys are
/// ignored.
pub fn synthesize_definition(raw: &Value) -> Result<TableDefinition, TableDefinitionError> {
    let obj = raw.as_object().ok_or(TableDefinitionError::NotAnObject)?;

    let table_name = match obj.get("tablename") {
        None | Some(Value::Null) => return Err(TableDefinitionError::MissingKey("tablename")),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(_) => {
            return Err(TableDefinitionError::WrongShape {
                key: "tablename",
                expected: "a non-empty string",
            })
        }
    };

    let raw_columns = match obj.get("columns") {
        None | Some(Value::Null) => return Err(TableDefinitionError::MissingKey("columns")),
        Some(Value::Array(columns)) => columns,
        Some(_) => {
            return Err(TableDefinitionError::WrongShape {
                key: "columns",
                expected: "an array of column definitions",
            })
        }
    };

    let columns = raw_columns
        .iter()
        .enumerate()
        .map(|(index, raw_column)| parse_column(&table_name, index, raw_column))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TableDefinition { table_name, columns })
}

fn parse_column(
    table: &str,
    index: usize,
    raw: &Value,
) -> Result<ColumnDefinition, TableDefinitionError> {
    let wrong_shape = |key: &'static str, expected: &'static str| {
        TableDefinitionError::WrongColumnShape {
            table: table.to_string(),
            index,
            key,
            expected,
        }
    };
    let missing = |key: &'static str| TableDefinitionError::MissingColumnKey {
        table: table.to_string(),
        index,
        key,
    };

    let obj = raw
        .as_object()
        .ok_or_else(|| wrong_shape("column", "an object"))?;

    let name = match obj.get("name") {
        None | Some(Value::Null) => return Err(missing("name")),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(wrong_shape("name", "a string")),
    };

    let column_type = match obj.get("type") {
        None | Some(Value::Null) => return Err(missing("type")),
        Some(Value::String(s)) => {
            resolve(s).map_err(|source| TableDefinitionError::UnknownType {
                table: table.to_string(),
                column: name.clone(),
                source,
            })?
        }
        Some(_) => return Err(wrong_shape("type", "a string")),
    };

    let length = match obj.get("length") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(
            n.as_i64()
                .ok_or_else(|| wrong_shape("length", "an integer"))?,
        ),
        Some(_) => return Err(wrong_shape("length", "an integer")),
    };

    let is_primary_key = match obj.get("primary_key") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(wrong_shape("primary_key", "a boolean")),
    };

    Ok(ColumnDefinition {
        name,
        column_type,
        length,
        is_primary_key,
    })
}

// ============================================================================
// Runtime Types
// ============================================================================

/// Column of a synthesized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Column type
    pub column_type: ColumnType,

    /// Character bound for `String` columns
    pub max_length: Option<u16>,

    /// Whether this column is the primary key
    pub primary_key: bool,
}

/// Runtime schema of one table.
///
/// Built by [`synthesize_schema`]; the only way to obtain a [`SchemaRow`] is
/// [`TableSchema::build_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    definition: TableDefinition,
    columns: Vec<Column>,
    primary_key: Option<usize>,
}

impl TableSchema {
    /// Table name.
    pub fn name(&self) -> &str {
        &self.definition.table_name
    }

    /// The definition this schema was synthesized from.
    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    /// Columns in declared order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key column, if one was declared.
    pub fn primary_key(&self) -> Option<&Column> {
        self.primary_key.map(|idx| &self.columns[idx])
    }

    /// All column names in declared order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Validate a target row against this schema.
    ///
    /// Columns missing from the row are set to null. Every value is coerced
    /// to its column type.
    pub fn build_row(&self, row: &TargetRow) -> Result<SchemaRow, RowError> {
        if row.table != self.name() {
            return Err(RowError::WrongTable {
                expected: self.name().to_string(),
                actual: row.table.clone(),
            });
        }

        if let Some(unknown) = row.columns().find(|name| self.column(name).is_none()) {
            return Err(RowError::UnknownColumn {
                table: self.name().to_string(),
                column: unknown.to_string(),
            });
        }

        let values = self
            .columns
            .iter()
            .map(|column| {
                let value = row.get(&column.name).cloned().unwrap_or(UniversalValue::Null);
                coerce_value(self.name(), column, value).map(|v| (column.name.clone(), v))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SchemaRow::new(self.name().to_string(), values))
    }
}

/// Build the runtime schema for a table definition.
pub fn synthesize_schema(definition: TableDefinition) -> Result<TableSchema, SchemaGenerationError> {
    let fail = |cause: SchemaCause| SchemaGenerationError {
        table: definition.table_name.clone(),
        cause,
    };

    if definition.columns.is_empty() {
        return Err(fail(SchemaCause::NoColumns));
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(definition.columns.len());
    for (index, declared) in definition.columns.iter().enumerate() {
        if declared.name.is_empty() {
            return Err(fail(SchemaCause::EmptyColumnName { index }));
        }
        if !seen.insert(declared.name.as_str()) {
            return Err(fail(SchemaCause::DuplicateColumn(declared.name.clone())));
        }

        let max_length = match (declared.column_type, declared.length) {
            (ty, Some(length)) if ty.supports_length() => {
                let bounded = u16::try_from(length).ok().filter(|l| *l > 0);
                match bounded {
                    Some(max) => Some(max),
                    None => {
                        return Err(fail(SchemaCause::InvalidLength {
                            column: declared.name.clone(),
                            length,
                        }))
                    }
                }
            }
            (other, Some(length)) => {
                tracing::warn!(
                    table = %definition.table_name,
                    column = %declared.name,
                    "Ignoring length {length} declared for {other} column"
                );
                None
            }
            (_, None) => None,
        };

        columns.push(Column {
            name: declared.name.clone(),
            column_type: declared.column_type,
            max_length,
            primary_key: declared.is_primary_key,
        });
    }

    let primary_keys: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.primary_key)
        .map(|(idx, _)| idx)
        .collect();
    if primary_keys.len() > 1 {
        return Err(fail(SchemaCause::MultiplePrimaryKeys(
            primary_keys
                .iter()
                .map(|&idx| columns[idx].name.clone())
                .collect(),
        )));
    }

    Ok(TableSchema {
        primary_key: primary_keys.first().copied(),
        columns,
        definition,
    })
}

/// Parse and synthesize a raw table definition in one step.
pub fn synthesize_table(raw: &Value) -> Result<TableSchema, DefinitionError> {
    let definition = synthesize_definition(raw)?;
    Ok(synthesize_schema(definition)?)
}

/// Coerce a value into the representation a column stores.
fn coerce_value(
    table: &str,
    column: &Column,
    value: UniversalValue,
) -> Result<UniversalValue, RowError> {
    if value.is_null() {
        if column.primary_key {
            return Err(RowError::NullPrimaryKey {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
        return Ok(UniversalValue::Null);
    }

    let mismatch = |value: &UniversalValue| RowError::TypeMismatch {
        table: table.to_string(),
        column: column.name.clone(),
        expected: column.column_type,
        value: value.to_string(),
    };

    let coerced = match (column.column_type, &value) {
        (ColumnType::Integer, UniversalValue::Int(_)) => value,
        (ColumnType::Integer, UniversalValue::Float(f))
            if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 =>
        {
            UniversalValue::Int(*f as i64)
        }
        (ColumnType::Integer, UniversalValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(UniversalValue::Int)
            .map_err(|_| mismatch(&value))?,

        (ColumnType::Float, UniversalValue::Float(_)) => value,
        (ColumnType::Float, UniversalValue::Int(i)) => UniversalValue::Float(*i as f64),
        (ColumnType::Float, UniversalValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(UniversalValue::Float)
            .map_err(|_| mismatch(&value))?,

        (ColumnType::String, UniversalValue::Text(_)) => value,
        (ColumnType::String, UniversalValue::Int(i)) => UniversalValue::Text(i.to_string()),
        (ColumnType::String, UniversalValue::Float(f)) => UniversalValue::Text(f.to_string()),
        (ColumnType::String, UniversalValue::Bool(b)) => UniversalValue::Text(b.to_string()),
        (ColumnType::String, UniversalValue::Timestamp(ts)) => {
            UniversalValue::Text(ts.to_rfc3339())
        }

        (ColumnType::Boolean, UniversalValue::Bool(_)) => value,
        (ColumnType::Boolean, UniversalValue::Int(0)) => UniversalValue::Bool(false),
        (ColumnType::Boolean, UniversalValue::Int(1)) => UniversalValue::Bool(true),
        (ColumnType::Boolean, UniversalValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str()
        {
            "true" => UniversalValue::Bool(true),
            "false" => UniversalValue::Bool(false),
            _ => return Err(mismatch(&value)),
        },

        (ColumnType::Timestamp, UniversalValue::Timestamp(_)) => value,
        (ColumnType::Timestamp, UniversalValue::Text(s)) => parse_timestamp_text(s)
            .map(UniversalValue::Timestamp)
            .ok_or_else(|| mismatch(&value))?,

        _ => return Err(mismatch(&value)),
    };

    if let (Some(max), UniversalValue::Text(s)) = (column.max_length, &coerced) {
        let length = s.chars().count();
        if length > usize::from(max) {
            return Err(RowError::TooLong {
                table: table.to_string(),
                column: column.name.clone(),
                length,
                max,
            });
        }
    }

    Ok(coerced)
}

/// Accepts CRM offset timestamps, RFC 3339, and offset-less ISO 8601 (read as UTC).
fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    parse_crm_timestamp(s)
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

// ============================================================================
// Registry
// ============================================================================

/// Name-indexed collection of table schemas.
///
/// Built once before any fetch begins and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
    table_map: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema. Table names must be unique.
    pub fn register(&mut self, schema: TableSchema) -> Result<(), DefinitionError> {
        if self.table_map.contains_key(schema.name()) {
            return Err(DefinitionError::DuplicateTable(schema.name().to_string()));
        }
        self.table_map
            .insert(schema.name().to_string(), self.tables.len());
        self.tables.push(schema);
        Ok(())
    }

    /// Get a table schema by name.
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.table_map
            .get(name)
            .and_then(|&idx| self.tables.get(idx))
    }

    /// All table names in registration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    /// Iterate over schemas in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn user_definition() -> Value {
        json!({
            "tablename": "User",
            "columns": [
                {"name": "ID", "type": "String", "length": 20, "primary_key": true},
                {"name": "NAME", "type": "String", "length": 50}
            ]
        })
    }

    fn users_table() -> TableSchema {
        synthesize_table(&json!({
            "tablename": "Users",
            "columns": [
                {"name": "id", "type": "Integer", "primary_key": true},
                {"name": "name", "type": "String", "length": 5},
                {"name": "score", "type": "Float"},
                {"name": "created_at", "type": "DateTime"},
                {"name": "is_active", "type": "Boolean"}
            ]
        }))
        .unwrap()
    }

    // ========================================================================
    // Definition Tests
    // ========================================================================

    #[test]
    fn test_synthesize_definition() {
        let definition = synthesize_definition(&user_definition()).unwrap();

        assert_eq!(definition.table_name, "User");
        assert_eq!(
            definition.columns,
            vec![
                ColumnDefinition::new("ID", ColumnType::String)
                    .with_length(20)
                    .primary_key(),
                ColumnDefinition::new("NAME", ColumnType::String).with_length(50),
            ]
        );
    }

    #[test]
    fn test_definition_matches_serde_form() {
        let parsed = synthesize_definition(&user_definition()).unwrap();
        let via_serde: TableDefinition = serde_json::from_value(user_definition()).unwrap();
        assert_eq!(parsed, via_serde);
    }

    #[test]
    fn test_definition_missing_keys() {
        assert_eq!(
            synthesize_definition(&json!({"columns": []})).unwrap_err(),
            TableDefinitionError::MissingKey("tablename")
        );
        assert_eq!(
            synthesize_definition(&json!({"tablename": "T"})).unwrap_err(),
            TableDefinitionError::MissingKey("columns")
        );

        let err = synthesize_definition(&json!({
            "tablename": "T",
            "columns": [{"type": "Integer"}]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            TableDefinitionError::MissingColumnKey { index: 0, key: "name", .. }
        ));

        let err = synthesize_definition(&json!({
            "tablename": "T",
            "columns": [{"name": "a"}]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            TableDefinitionError::MissingColumnKey { key: "type", .. }
        ));
    }

    #[test]
    fn test_definition_wrong_shapes() {
        assert_eq!(
            synthesize_definition(&json!("User")).unwrap_err(),
            TableDefinitionError::NotAnObject
        );
        assert!(matches!(
            synthesize_definition(&json!({"tablename": "", "columns": []})),
            Err(TableDefinitionError::WrongShape { key: "tablename", .. })
        ));
        assert!(matches!(
            synthesize_definition(&json!({"tablename": "T", "columns": {}})),
            Err(TableDefinitionError::WrongShape { key: "columns", .. })
        ));
        assert!(matches!(
            synthesize_definition(&json!({
                "tablename": "T",
                "columns": [{"name": "a", "type": "String", "length": "20"}]
            })),
            Err(TableDefinitionError::WrongColumnShape { key: "length", .. })
        ));
        assert!(matches!(
            synthesize_definition(&json!({
                "tablename": "T",
                "columns": [{"name": "a", "type": "Integer", "primary_key": "yes"}]
            })),
            Err(TableDefinitionError::WrongColumnShape { key: "primary_key", .. })
        ));
    }

    #[test]
    fn test_definition_unknown_type() {
        let err = synthesize_definition(&json!({
            "tablename": "T",
            "columns": [{"name": "payload", "type": "JSON"}]
        }))
        .unwrap_err();

        match err {
            TableDefinitionError::UnknownType {
                table,
                column,
                source,
            } => {
                assert_eq!(table, "T");
                assert_eq!(column, "payload");
                assert_eq!(source.type_name, "JSON");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ========================================================================
    // Schema Tests
    // ========================================================================

    #[test]
    fn test_synthesize_schema() {
        let schema = synthesize_schema(synthesize_definition(&user_definition()).unwrap()).unwrap();

        assert_eq!(schema.name(), "User");
        assert_eq!(schema.column_names(), vec!["ID", "NAME"]);
        let pk = schema.primary_key().expect("primary key");
        assert_eq!(pk.name, "ID");
        assert_eq!(pk.max_length, Some(20));
        assert_eq!(schema.column("NAME").unwrap().max_length, Some(50));
    }

    #[test]
    fn test_synthesize_schema_is_idempotent() {
        let definition = synthesize_definition(&user_definition()).unwrap();
        let first = synthesize_schema(definition.clone()).unwrap();
        let second = synthesize_schema(definition).unwrap();

        assert_eq!(first.columns(), second.columns());
        assert_eq!(first, second);
    }

    #[test]
    fn test_multiple_primary_keys_fail() {
        let definition = TableDefinition::new(
            "T",
            vec![
                ColumnDefinition::new("a", ColumnType::Integer).primary_key(),
                ColumnDefinition::new("b", ColumnType::Integer).primary_key(),
            ],
        );
        let err = synthesize_schema(definition).unwrap_err();
        assert_eq!(err.table, "T");
        assert_eq!(
            err.cause,
            SchemaCause::MultiplePrimaryKeys(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_no_primary_key_is_allowed() {
        let schema = synthesize_schema(TableDefinition::new(
            "Log",
            vec![ColumnDefinition::new("message", ColumnType::String)],
        ))
        .unwrap();
        assert!(schema.primary_key().is_none());
    }

    #[test]
    fn test_invalid_lengths_fail() {
        for length in [0, -5, 70_000] {
            let definition = TableDefinition::new(
                "T",
                vec![ColumnDefinition::new("s", ColumnType::String).with_length(length)],
            );
            let err = synthesize_schema(definition).unwrap_err();
            assert_eq!(
                err.cause,
                SchemaCause::InvalidLength {
                    column: "s".to_string(),
                    length
                }
            );
        }
    }

    #[test]
    fn test_length_ignored_for_non_string_columns() {
        let schema = synthesize_schema(TableDefinition::new(
            "T",
            vec![ColumnDefinition::new("n", ColumnType::Integer).with_length(-1)],
        ))
        .unwrap();
        assert_eq!(schema.column("n").unwrap().max_length, None);
    }

    #[test]
    fn test_structural_failures() {
        let err = synthesize_schema(TableDefinition::new("T", vec![])).unwrap_err();
        assert_eq!(err.cause, SchemaCause::NoColumns);

        let err = synthesize_schema(TableDefinition::new(
            "T",
            vec![
                ColumnDefinition::new("a", ColumnType::Integer),
                ColumnDefinition::new("a", ColumnType::String),
            ],
        ))
        .unwrap_err();
        assert_eq!(err.cause, SchemaCause::DuplicateColumn("a".to_string()));

        let err = synthesize_schema(TableDefinition::new(
            "T",
            vec![ColumnDefinition::new("", ColumnType::Integer)],
        ))
        .unwrap_err();
        assert_eq!(err.cause, SchemaCause::EmptyColumnName { index: 0 });
    }

    #[test]
    fn test_synthesize_table_wraps_both_stages() {
        assert!(matches!(
            synthesize_table(&json!({"tablename": "T", "columns": [{"name": "a", "type": "Text"}]})),
            Err(DefinitionError::Table(TableDefinitionError::UnknownType { .. }))
        ));
        assert!(matches!(
            synthesize_table(&json!({"tablename": "T", "columns": []})),
            Err(DefinitionError::Schema(_))
        ));
    }

    // ========================================================================
    // Row Tests
    // ========================================================================

    #[test]
    fn test_build_row_fills_missing_columns_with_null() {
        let schema = users_table();
        let row = schema
            .build_row(&TargetRow::new("Users").with("name", "Jane").with("id", 233_i64))
            .unwrap();

        assert_eq!(row.table(), "Users");
        let names: Vec<&str> = row.values().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "score", "created_at", "is_active"]);
        assert_eq!(row.get("id"), Some(&UniversalValue::Int(233)));
        assert_eq!(row.get("score"), Some(&UniversalValue::Null));
    }

    #[test]
    fn test_build_row_coerces_values() {
        let schema = users_table();
        let row = schema
            .build_row(
                &TargetRow::new("Users")
                    .with("id", "232")
                    .with("name", "John")
                    .with("score", 3_i64)
                    .with("created_at", "2023-08-01T12:00:00")
                    .with("is_active", "TRUE"),
            )
            .unwrap();

        assert_eq!(row.get("id"), Some(&UniversalValue::Int(232)));
        assert_eq!(row.get("score"), Some(&UniversalValue::Float(3.0)));
        assert_eq!(
            row.get("created_at"),
            Some(&UniversalValue::Timestamp(
                Utc.with_ymd_and_hms(2023, 8, 1, 12, 0, 0).unwrap()
            ))
        );
        assert_eq!(row.get("is_active"), Some(&UniversalValue::Bool(true)));
    }

    #[test]
    fn test_build_row_renders_scalars_into_string_columns() {
        let schema = synthesize_table(&json!({
            "tablename": "T",
            "columns": [{"name": "s", "type": "String"}]
        }))
        .unwrap();

        let row = schema.build_row(&TargetRow::new("T").with("s", false)).unwrap();
        assert_eq!(row.get("s"), Some(&UniversalValue::from("false")));

        let ts = Utc.with_ymd_and_hms(2023, 7, 11, 9, 8, 46).unwrap();
        let row = schema.build_row(&TargetRow::new("T").with("s", ts)).unwrap();
        assert_eq!(row.get("s"), Some(&UniversalValue::from("2023-07-11T09:08:46+00:00")));
    }

    #[test]
    fn test_build_row_rejections() {
        let schema = users_table();

        assert!(matches!(
            schema.build_row(&TargetRow::new("Other").with("id", 1_i64)),
            Err(RowError::WrongTable { .. })
        ));
        assert!(matches!(
            schema.build_row(&TargetRow::new("Users").with("id", 1_i64).with("email", "x")),
            Err(RowError::UnknownColumn { column, .. }) if column == "email"
        ));
        assert!(matches!(
            schema.build_row(&TargetRow::new("Users").with("name", "x")),
            Err(RowError::NullPrimaryKey { .. })
        ));
        assert!(matches!(
            schema.build_row(&TargetRow::new("Users").with("id", "abc")),
            Err(RowError::TypeMismatch { expected: ColumnType::Integer, .. })
        ));
        assert!(matches!(
            schema.build_row(&TargetRow::new("Users").with("id", 1_i64).with("is_active", 2_i64)),
            Err(RowError::TypeMismatch { expected: ColumnType::Boolean, .. })
        ));
        assert!(matches!(
            schema.build_row(&TargetRow::new("Users").with("id", 1_i64).with("created_at", true)),
            Err(RowError::TypeMismatch { expected: ColumnType::Timestamp, .. })
        ));
    }

    #[test]
    fn test_build_row_enforces_string_length() {
        let schema = users_table();
        let err = schema
            .build_row(&TargetRow::new("Users").with("id", 1_i64).with("name", "Alexander"))
            .unwrap_err();
        assert_eq!(
            err,
            RowError::TooLong {
                table: "Users".to_string(),
                column: "name".to_string(),
                length: 9,
                max: 5,
            }
        );

        // Length is counted in characters, not bytes
        assert!(schema
            .build_row(&TargetRow::new("Users").with("id", 1_i64).with("name", "Åsa Ø"))
            .is_ok());
    }

    // ========================================================================
    // Registry Tests
    // ========================================================================

    #[test]
    fn test_registry_lookup_and_duplicates() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(synthesize_table(&user_definition()).unwrap())
            .unwrap();
        registry.register(users_table()).unwrap();

        assert_eq!(registry.table_names(), vec!["User", "Users"]);
        assert_eq!(registry.get("Users").unwrap().name(), "Users");
        assert!(registry.get("users").is_none());

        let err = registry
            .register(synthesize_table(&user_definition()).unwrap())
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateTable("User".to_string()));
        assert_eq!(registry.len(), 2);
    }
}
