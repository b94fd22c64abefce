//! salesforce-sync library
//!
//! Copies Salesforce records into a relational database. Both the target
//! tables and the object-to-table projections are declared in JSON files:
//!
//! - `db_tables.json` - table definitions (`tablename`, typed `columns`)
//! - `salesforce_to_db.json` - mappings (`salesforce-object`, `db-table`,
//!   `column-mapping`)
//!
//! # Crates
//!
//! - `sync_core` - schema and mapping synthesis, record conversion
//! - `salesforce_source` - CRM client trait, Salesforce REST client, SOQL
//! - `sql_sink` - storage sink traits
//! - `sqlite_sink` - SQLite storage sink
//!
//! # CLI Usage
//!
//! ```bash
//! # Copy every mapped object into the configured database
//! salesforce-sync run --credentials config/salesforce_credentials.yaml \
//!   --mappings config/salesforce_to_db.json --tables config/db_tables.json \
//!   --db-config config/db_config.yaml
//!
//! # Check definitions without touching the network
//! salesforce-sync validate --mappings config/salesforce_to_db.json --tables config/db_tables.json
//!
//! # Print the SOQL issued for each mapping
//! salesforce-sync query --mappings config/salesforce_to_db.json --tables config/db_tables.json
//! ```

use clap::Parser;
use std::path::PathBuf;
use sync_core::MappingMode;

pub mod config;
pub mod sync;

pub use sync::{
    DefinitionFailure, MappingError, MappingOutcome, MappingReport, SyncError, SyncOptions,
    SyncOrchestrator, SyncReport, SyncState,
};

#[derive(Parser, Clone, Debug)]
pub struct DefinitionOpts {
    /// JSON file with table definitions
    #[arg(long, env = "SF_SYNC_TABLES", default_value = "config/db_tables.json")]
    pub tables: PathBuf,

    /// JSON file with Salesforce object to table mappings
    #[arg(
        long,
        env = "SF_SYNC_MAPPINGS",
        default_value = "config/salesforce_to_db.json"
    )]
    pub mappings: PathBuf,

    /// Reject mappings without `salesforce-object` or `db-table`
    /// instead of skipping them as orphans
    #[arg(long, env = "SF_SYNC_STRICT_MAPPINGS")]
    pub strict_mappings: bool,
}

impl DefinitionOpts {
    pub fn mapping_mode(&self) -> MappingMode {
        if self.strict_mappings {
            MappingMode::Strict
        } else {
            MappingMode::Lenient
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct DatabaseOpts {
    /// YAML file holding the `connection-string` of the target database
    #[arg(
        long,
        env = "SF_SYNC_DB_CONFIG",
        default_value = "config/db_config.yaml",
        conflicts_with = "connection_string"
    )]
    pub db_config: PathBuf,

    /// Target database connection string, e.g. `sqlite:///example.db` or
    /// `postgresql://user:pw@localhost/crm`
    #[arg(long, env = "SF_SYNC_CONNECTION_STRING")]
    pub connection_string: Option<String>,
}

#[derive(Parser, Clone, Debug)]
pub struct SyncOpts {
    /// Fetch and convert records but don't write them
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of records to fetch per mapping
    #[arg(long, env = "SF_SYNC_LIMIT")]
    pub limit: Option<u64>,
}

impl SyncOpts {
    pub fn to_options(&self, mode: MappingMode) -> SyncOptions {
        SyncOptions {
            mode,
            dry_run: self.dry_run,
            limit: self.limit,
        }
    }
}
