//! StorageSink and SinkTransaction trait definitions.

use crate::error::StorageError;
use sync_core::{SchemaRow, TableSchema};

/// Trait for opening write transactions against a relational store.
///
/// # Usage Pattern
///
/// The orchestrator opens one transaction per mapping:
///
/// ```ignore
/// let mut tx = sink.begin(&[schema]).await?;
/// match tx.insert_all(&rows).await {
///     Ok(_) => tx.commit().await?,
///     Err(e) => {
///         tx.rollback().await?;
///         return Err(e);
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait StorageSink: Send + Sync {
    /// Open a transaction and make sure the given tables exist.
    ///
    /// Tables are created if missing; existing tables are left as they are.
    async fn begin(&self, tables: &[&TableSchema]) -> Result<Box<dyn SinkTransaction>, StorageError>;
}

/// An open write transaction.
///
/// Dropping a transaction without calling [`SinkTransaction::commit`] or
/// [`SinkTransaction::rollback`] rolls it back.
#[async_trait::async_trait]
pub trait SinkTransaction: Send {
    /// Insert rows in order, returning the number inserted.
    ///
    /// A primary key or unique violation fails with
    /// [`StorageError::DuplicateKey`]; the transaction stays open and should
    /// be rolled back.
    async fn insert_all(&mut self, rows: &[SchemaRow]) -> Result<u64, StorageError>;

    /// Make every insert of this transaction durable.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discard every insert of this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
