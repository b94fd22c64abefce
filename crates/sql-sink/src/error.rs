/// Failure inside a storage sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The connection string does not name a supported database
    #[error("Invalid connection string '{url}': {reason}")]
    InvalidConnectionString { url: String, reason: String },

    /// The database could not be opened
    #[error("Failed to open database: {0}")]
    Connection(String),

    /// A table could not be created
    #[error("Cannot create table '{table}': {reason}")]
    Schema { table: String, reason: String },

    /// An insert collided with an existing primary key or unique value
    #[error("Duplicate key in table '{table}': {detail}")]
    DuplicateKey { table: String, detail: String },

    /// Any other database failure
    #[error("Storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Whether this is a [`StorageError::DuplicateKey`].
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
