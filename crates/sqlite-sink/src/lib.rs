//! SQLite storage sink.
//!
//! Implements `sql_sink::StorageSink` on a single rusqlite connection.
//! Each transaction holds the connection exclusively until it is committed,
//! rolled back, or dropped.

mod ddl;
mod value;

use rusqlite::{ffi, params_from_iter, Connection, ErrorCode};
use sql_sink::{SinkTransaction, StorageError, StorageSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync_core::{SchemaRow, TableSchema, TargetRow};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use url::Url;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    File(PathBuf),
    InMemory,
}

impl SqliteLocation {
    /// Parse a connection string.
    ///
    /// Accepted forms:
    /// - `sqlite:///relative/path.db` and `sqlite:////absolute/path.db`
    /// - `sqlite:path.db`
    /// - `sqlite::memory:`, `sqlite:///:memory:` and `sqlite://`
    ///
    /// A host, port, query string or fragment is rejected.
    pub fn parse(url_str: &str) -> Result<Self, StorageError> {
        let invalid = |reason: String| StorageError::InvalidConnectionString {
            url: url_str.to_string(),
            reason,
        };

        let url = Url::parse(url_str).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != "sqlite" {
            return Err(invalid(format!(
                "connection URL does not have a `sqlite` scheme, found `{}`",
                url.scheme()
            )));
        }
        if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
            return Err(invalid(format!(
                "unexpected host `{host}`, use sqlite:///path for a relative file"
            )));
        }
        if url.port().is_some() || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid(
                "ports, query strings and fragments are not supported".to_string(),
            ));
        }

        // The authority form keeps the separator before the path: `sqlite:///x` is `x`
        let path = if url.cannot_be_a_base() {
            url.path()
        } else {
            url.path().strip_prefix('/').unwrap_or(url.path())
        };
        match path {
            "" | ":memory:" => Ok(Self::InMemory),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

/// SQLite implementation of [`StorageSink`].
pub struct SqliteSink {
    location: SqliteLocation,
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open the database named by a connection string.
    pub fn connect(url: &str) -> Result<Self, StorageError> {
        match SqliteLocation::parse(url)? {
            SqliteLocation::File(path) => Self::open(path),
            SqliteLocation::InMemory => Self::in_memory(),
        }
    }

    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        tracing::debug!("Opening SQLite database at {}", path.display());
        let connection =
            Connection::open(path).map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self::from_connection(
            SqliteLocation::File(path.to_path_buf()),
            connection,
        ))
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let connection =
            Connection::open_in_memory().map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self::from_connection(SqliteLocation::InMemory, connection))
    }

    fn from_connection(location: SqliteLocation, connection: Connection) -> Self {
        Self {
            location,
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    /// Where this sink writes.
    pub fn location(&self) -> &SqliteLocation {
        &self.location
    }

    /// Connection for reads outside a transaction. Fails instead of waiting
    /// while a transaction holds it.
    fn idle_connection(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.connection.try_lock().map_err(|_| {
            StorageError::Operation("a transaction is open on this connection".to_string())
        })
    }

    /// Number of rows in a table.
    ///
    /// Fails with [`StorageError::Operation`] while a transaction is open.
    pub async fn count_rows(&self, table: &str) -> Result<u64, StorageError> {
        let conn = self.idle_connection()?;
        let sql = format!("SELECT COUNT(*) FROM {}", ddl::quote_ident(table));
        conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(operation_error)
    }

    /// Read every row of a table in insertion order.
    ///
    /// Like [`count_rows`](Self::count_rows), this does not wait for an open
    /// transaction.
    pub async fn read_rows(&self, schema: &TableSchema) -> Result<Vec<TargetRow>, StorageError> {
        let conn = self.idle_connection()?;
        let columns: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| ddl::quote_ident(&c.name))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns.join(", "),
            ddl::quote_ident(schema.name())
        );

        let mut stmt = conn.prepare(&sql).map_err(operation_error)?;
        let rows = stmt
            .query_map([], |row| {
                let mut target = TargetRow::new(schema.name());
                for (idx, column) in schema.columns().iter().enumerate() {
                    let raw: rusqlite::types::Value = row.get(idx)?;
                    target.set(column.name.as_str(), value::from_sql(raw, column.column_type));
                }
                Ok(target)
            })
            .map_err(operation_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(operation_error)
    }
}

#[async_trait::async_trait]
impl StorageSink for SqliteSink {
    async fn begin(&self, tables: &[&TableSchema]) -> Result<Box<dyn SinkTransaction>, StorageError> {
        for schema in tables {
            if schema.primary_key().is_none() {
                return Err(StorageError::Schema {
                    table: schema.name().to_string(),
                    reason: "a primary key column is required".to_string(),
                });
            }
        }

        let conn = self.connection.clone().lock_owned().await;
        conn.execute_batch("BEGIN").map_err(operation_error)?;
        let mut tx = SqliteTransaction {
            conn,
            finished: false,
        };

        for schema in tables {
            let sql = ddl::create_table_sql(schema);
            tracing::debug!(table = %schema.name(), "{sql}");
            tx.conn
                .execute_batch(&sql)
                .map_err(|e| StorageError::Schema {
                    table: schema.name().to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(Box::new(tx))
    }
}

/// Open SQLite transaction. Rolls back on drop unless finished.
struct SqliteTransaction {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

impl SqliteTransaction {
    fn insert_row(&self, row: &SchemaRow) -> Result<(), StorageError> {
        let sql = ddl::insert_sql(row.table(), row.values().iter().map(|(c, _)| c.as_str()));
        let mut stmt = self.conn.prepare_cached(&sql).map_err(operation_error)?;
        stmt.execute(params_from_iter(
            row.values().iter().map(|(_, v)| value::Param(v)),
        ))
        .map_err(|e| insert_error(row.table(), e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SinkTransaction for SqliteTransaction {
    async fn insert_all(&mut self, rows: &[SchemaRow]) -> Result<u64, StorageError> {
        for row in rows {
            self.insert_row(row)?;
        }
        Ok(rows.len() as u64)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        self.conn.execute_batch("COMMIT").map_err(operation_error)?;
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK").map_err(operation_error)
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("Transaction dropped without commit; rolling back");
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::error!("Rollback on drop failed: {e}");
        }
    }
}

fn operation_error(e: rusqlite::Error) -> StorageError {
    StorageError::Operation(e.to_string())
}

fn insert_error(table: &str, e: rusqlite::Error) -> StorageError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                ) =>
        {
            StorageError::DuplicateKey {
                table: table.to_string(),
                detail: e.to_string(),
            }
        }
        _ => operation_error(e),
    }
}
