//! Relational storage sink trait abstraction.
//!
//! This crate defines the `StorageSink` and `SinkTransaction` traits the
//! sync orchestrator writes through. `sqlite-sink` and `postgresql-sink`
//! implement them.
//!
//! Rows cross this boundary as sync-core `SchemaRow` values, already
//! validated against their `TableSchema`.

mod error;
mod traits;

pub use error::StorageError;
pub use traits::{SinkTransaction, StorageSink};
