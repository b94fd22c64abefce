//! PostgreSQL storage sink.
//!
//! Implements `sql_sink::StorageSink` on a single `tokio_postgres::Client`.
//! Like the SQLite sink, a transaction holds the client exclusively until it
//! is committed, rolled back, or dropped.

mod ddl;
mod value;

use sql_sink::{SinkTransaction, StorageError, StorageSink};
use std::collections::HashMap;
use std::sync::Arc;
use sync_core::{SchemaRow, TableSchema, TargetRow};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Statement};

/// Whether a connection string names a PostgreSQL database.
///
/// Accepts `postgres://` and `postgresql://`, with an optional
/// `+driver` suffix on the scheme (`postgresql+psycopg2://`).
pub fn is_postgres_url(url: &str) -> bool {
    url.split_once("://")
        .map(|(scheme, _)| scheme.split('+').next().unwrap_or_default())
        .is_some_and(|scheme| matches!(scheme, "postgres" | "postgresql"))
}

/// Strip a `+driver` suffix from the scheme.
fn normalize_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => match scheme.split_once('+') {
            Some((base, _driver)) => format!("{base}://{rest}"),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}

/// PostgreSQL implementation of [`StorageSink`].
pub struct PostgresSink {
    client: Arc<Mutex<Client>>,
}

impl PostgresSink {
    /// Connect and spawn the connection task on the current runtime.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        if !is_postgres_url(url) {
            return Err(StorageError::InvalidConnectionString {
                url: url.to_string(),
                reason: "expected a postgres:// or postgresql:// URL".to_string(),
            });
        }

        let (client, connection) = tokio_postgres::connect(&normalize_url(url), NoTls)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {e}");
            }
        });

        tracing::debug!("Connected to PostgreSQL");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
        })
    }

    fn idle_client(&self) -> Result<MutexGuard<'_, Client>, StorageError> {
        self.client.try_lock().map_err(|_| {
            StorageError::Operation("a transaction is open on this connection".to_string())
        })
    }

    /// Number of rows in a table. Fails while a transaction is open.
    pub async fn count_rows(&self, table: &str) -> Result<u64, StorageError> {
        let client = self.idle_client()?;
        let sql = format!("SELECT COUNT(*) FROM {}", ddl::quote_ident(table));
        let row = client.query_one(&sql, &[]).await.map_err(operation_error)?;
        let count: i64 = row.try_get(0).map_err(operation_error)?;
        Ok(count as u64)
    }

    /// Read every row of a table, ordered by primary key.
    pub async fn read_rows(&self, schema: &TableSchema) -> Result<Vec<TargetRow>, StorageError> {
        let client = self.idle_client()?;
        let columns: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| ddl::quote_ident(&c.name))
            .collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            ddl::quote_ident(schema.name())
        );
        if let Some(pk) = schema.primary_key() {
            sql.push_str(&format!(" ORDER BY {}", ddl::quote_ident(&pk.name)));
        }

        let rows = client.query(&sql, &[]).await.map_err(operation_error)?;
        rows.iter()
            .map(|row| {
                let mut target = TargetRow::new(schema.name());
                for (idx, column) in schema.columns().iter().enumerate() {
                    let value =
                        value::from_row(row, idx, column.column_type).map_err(operation_error)?;
                    target.set(column.name.as_str(), value);
                }
                Ok(target)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl StorageSink for PostgresSink {
    async fn begin(&self, tables: &[&TableSchema]) -> Result<Box<dyn SinkTransaction>, StorageError> {
        for schema in tables {
            if schema.primary_key().is_none() {
                return Err(StorageError::Schema {
                    table: schema.name().to_string(),
                    reason: "a primary key column is required".to_string(),
                });
            }
        }

        let client = self.client.clone().lock_owned().await;
        client.batch_execute("BEGIN").await.map_err(operation_error)?;
        let tx = PostgresTransaction {
            client: Some(client),
            statements: HashMap::new(),
        };

        for schema in tables {
            let sql = ddl::create_table_sql(schema);
            tracing::debug!(table = %schema.name(), "{sql}");
            tx.client()?
                .batch_execute(&sql)
                .await
                .map_err(|e| StorageError::Schema {
                    table: schema.name().to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(Box::new(tx))
    }
}

/// Open PostgreSQL transaction. Rolls back on drop unless finished.
struct PostgresTransaction {
    /// `None` once committed or rolled back
    client: Option<OwnedMutexGuard<Client>>,
    statements: HashMap<String, Statement>,
}

impl PostgresTransaction {
    fn client(&self) -> Result<&Client, StorageError> {
        self.client
            .as_deref()
            .ok_or_else(|| StorageError::Operation("transaction already finished".to_string()))
    }

    async fn insert_row(&mut self, row: &SchemaRow) -> Result<(), StorageError> {
        let sql = ddl::insert_sql(row.table(), row.values().iter().map(|(c, _)| c.as_str()));
        let statement = match self.statements.get(&sql).cloned() {
            Some(statement) => statement,
            None => {
                let statement = self
                    .client()?
                    .prepare(&sql)
                    .await
                    .map_err(|e| insert_error(row.table(), e))?;
                self.statements.insert(sql, statement.clone());
                statement
            }
        };

        let params: Vec<value::Param<'_>> =
            row.values().iter().map(|(_, v)| value::Param(v)).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.client()?
            .execute(&statement, &refs)
            .await
            .map_err(|e| insert_error(row.table(), e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SinkTransaction for PostgresTransaction {
    async fn insert_all(&mut self, rows: &[SchemaRow]) -> Result<u64, StorageError> {
        for row in rows {
            self.insert_row(row).await?;
        }
        Ok(rows.len() as u64)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        let client = self.client.take().ok_or_else(|| {
            StorageError::Operation("transaction already finished".to_string())
        })?;
        client.batch_execute("COMMIT").await.map_err(operation_error)
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        let client = self.client.take().ok_or_else(|| {
            StorageError::Operation("transaction already finished".to_string())
        })?;
        client.batch_execute("ROLLBACK").await.map_err(operation_error)
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        tracing::warn!("Transaction dropped without commit; rolling back");

        // The guard moves into the task, so the next `begin` waits for the rollback
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        tracing::error!("Rollback on drop failed: {e}");
                    }
                });
            }
            Err(_) => tracing::error!("No runtime to roll back a dropped transaction"),
        }
    }
}

fn operation_error(e: tokio_postgres::Error) -> StorageError {
    StorageError::Operation(e.to_string())
}

fn insert_error(table: &str, e: tokio_postgres::Error) -> StorageError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let detail = e
            .as_db_error()
            .and_then(|db| db.detail())
            .map(str::to_string)
            .unwrap_or_else(|| e.to_string());
        StorageError::DuplicateKey {
            table: table.to_string(),
            detail,
        }
    } else {
        operation_error(e)
    }
}
