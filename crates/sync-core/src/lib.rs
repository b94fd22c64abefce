//! Core types for salesforce-sync.
//!
//! This crate holds everything that does not talk to the network or to a
//! database:
//!
//! - [`ColumnType`] - The closed set of declarable column types
//! - [`TableSchema`] - Runtime table schema synthesized from a definition
//! - [`TableMapping`] - Validated CRM object to table projection
//! - [`UniversalValue`] - Coerced value shared by converter and sinks
//! - [`convert`](convert::convert) - CRM record to target row conversion
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── salesforce-source  (produces SourceRecord values)
//!    ├─── sql-sink           (consumes SchemaRow values)
//!    │      └─── sqlite-sink
//!    └─── salesforce-sync    (drives a run end to end)
//! ```
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use sync_core::{convert::convert, synthesize_mapping, synthesize_table, MappingMode};
//!
//! let schema = synthesize_table(&json!({
//!     "tablename": "User",
//!     "columns": [{"name": "ID", "type": "String", "length": 20, "primary_key": true}]
//! }))
//! .unwrap();
//! let mapping = synthesize_mapping(
//!     &json!({"salesforce-object": "Account", "db-table": "User", "column-mapping": {"Id": "ID"}}),
//!     MappingMode::Strict,
//! )
//! .unwrap();
//!
//! let record = json!({"Id": "001"}).as_object().cloned().unwrap();
//! let row = schema.build_row(&convert(record, &mapping)).unwrap();
//! assert_eq!(row.table(), "User");
//! ```

pub mod convert;
pub mod error;
pub mod mapping;
pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use error::{
    DefinitionError, MappingValidationError, RowError, SchemaCause, SchemaGenerationError,
    TableDefinitionError, UnknownTypeError,
};
pub use mapping::{synthesize_mapping, ColumnMapping, MappingMode, TableMapping};
pub use schema::{
    synthesize_definition, synthesize_schema, synthesize_table, Column, ColumnDefinition,
    SchemaRegistry, TableDefinition, TableSchema,
};
pub use types::{resolve, ColumnType};
pub use values::{SchemaRow, SourceRecord, TargetRow, UniversalValue};
