//! Object-to-table mappings.
//!
//! A mapping document names a CRM object, a destination table, and the
//! field-to-column pairs that project one onto the other:
//!
//! ```json
//! {
//!   "salesforce-object": "Account",
//!   "db-table": "User",
//!   "column-mapping": { "Id": "ID", "Name": "NAME" }
//! }
//! ```

use crate::error::MappingValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const OBJECT_KEY: &str = "salesforce-object";
const TABLE_KEY: &str = "db-table";
const COLUMNS_KEY: &str = "column-mapping";

/// How missing object/table names are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MappingMode {
    /// Missing `salesforce-object` / `db-table` become empty strings.
    /// Such a mapping never matches a table and is skipped as an orphan.
    #[default]
    Lenient,

    /// Missing or empty `salesforce-object` / `db-table` are rejected.
    Strict,
}

/// One `source_field -> destination_column` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Field name on the CRM object
    pub source_field: String,

    /// Column name in the destination table
    pub destination_column: String,
}

impl ColumnMapping {
    /// Create a new column mapping.
    pub fn new(source_field: impl Into<String>, destination_column: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            destination_column: destination_column.into(),
        }
    }
}

/// Validated projection from a CRM object onto a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    /// CRM object to query
    pub source_object_name: String,

    /// Table receiving the rows
    pub destination_table_name: String,

    /// Ordered field-to-column pairs (never empty)
    pub column_mappings: Vec<ColumnMapping>,
}

impl TableMapping {
    /// Create a mapping, checking the column pairs.
    ///
    /// Object and table names are not checked here; see [`MappingMode`].
    pub fn new(
        source_object_name: impl Into<String>,
        destination_table_name: impl Into<String>,
        column_mappings: Vec<ColumnMapping>,
    ) -> Result<Self, MappingValidationError> {
        let source_object_name = source_object_name.into();

        if column_mappings.is_empty() {
            return Err(MappingValidationError::NoColumnMappings);
        }
        for pair in &column_mappings {
            if pair.source_field.is_empty() {
                return Err(MappingValidationError::EmptySourceField {
                    object: source_object_name,
                });
            }
            if pair.destination_column.is_empty() {
                return Err(MappingValidationError::InvalidDestinationColumn {
                    field: pair.source_field.clone(),
                });
            }
        }

        Ok(Self {
            source_object_name,
            destination_table_name: destination_table_name.into(),
            column_mappings,
        })
    }

    /// Source field names in mapping order (may repeat).
    pub fn source_fields(&self) -> Vec<&str> {
        self.column_mappings
            .iter()
            .map(|c| c.source_field.as_str())
            .collect()
    }

    /// Source field names in mapping order, without repeats.
    ///
    /// This is the projection list sent to the CRM.
    pub fn query_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::with_capacity(self.column_mappings.len());
        for field in self.source_fields() {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    /// Destination column names in mapping order.
    pub fn destination_columns(&self) -> Vec<&str> {
        self.column_mappings
            .iter()
            .map(|c| c.destination_column.as_str())
            .collect()
    }
}

/// Build a [`TableMapping`] from a raw mapping document.
///
/// `column-mapping` entries keep their document order. A key repeated inside
/// `column-mapping` collapses to a single entry holding the last value.
pub fn synthesize_mapping(
    raw: &Value,
    mode: MappingMode,
) -> Result<TableMapping, MappingValidationError> {
    let obj = raw.as_object().ok_or(MappingValidationError::NotAnObject)?;

    let source_object = read_name(obj, OBJECT_KEY, mode)?;
    let destination_table = read_name(obj, TABLE_KEY, mode)?;

    let columns = match obj.get(COLUMNS_KEY) {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(MappingValidationError::WrongShape {
                key: COLUMNS_KEY,
                expected: "an object of field to column names",
            })
        }
    };

    let mut column_mappings = Vec::with_capacity(columns.len());
    for (field, column) in columns {
        match column {
            Value::String(column) => column_mappings.push(ColumnMapping::new(field, column)),
            _ => return Err(MappingValidationError::InvalidDestinationColumn { field }),
        }
    }

    TableMapping::new(source_object, destination_table, column_mappings)
}

fn read_name(
    obj: &serde_json::Map<String, Value>,
    key: &'static str,
    mode: MappingMode,
) -> Result<String, MappingValidationError> {
    let name = match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(MappingValidationError::WrongShape {
                key,
                expected: "a string",
            })
        }
    };

    if name.is_empty() && mode == MappingMode::Strict {
        return Err(MappingValidationError::EmptyName(key));
    }
    Ok(name)
}
