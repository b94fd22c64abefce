//! Sync orchestration.
//!
//! A run walks through these states:
//!
//! ```text
//! Idle -> MappingsLoaded -> SchemasLoaded -> Connected -> Syncing(i) -> Done
//!   \__________________________________________________________________/
//!                                   |
//!                                Failed
//! ```
//!
//! Definition problems (a bad mapping, a bad table) are recorded in the
//! [`SyncReport`] and never stop the run. A failed CRM login does. Every
//! mapping is fetched, converted and written in its own storage transaction,
//! strictly one after another: a failure only rolls back that mapping.

use salesforce_source::{CrmClient, CrmError, SoqlQuery};
use serde_json::Value;
use sql_sink::{StorageError, StorageSink};
use sync_core::convert::convert;
use sync_core::{
    synthesize_mapping, synthesize_table, DefinitionError, MappingMode, MappingValidationError,
    RowError, SchemaRegistry, TableMapping, TableSchema,
};

/// Options for a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// How mappings missing their object or table name are treated
    pub mode: MappingMode,

    /// Fetch and convert, but never open a storage transaction
    pub dry_run: bool,

    /// `LIMIT` appended to every projection query
    pub limit: Option<u64>,
}

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    MappingsLoaded,
    SchemasLoaded,
    Connected,
    /// Processing the mapping at this position
    Syncing(usize),
    Done,
    Failed,
}

/// Fatal orchestrator error.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Cannot {operation} while the orchestrator is in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SyncState,
    },

    #[error("No loaded mapping at position {0}")]
    UnknownMapping(usize),

    #[error("Failed to connect to Salesforce")]
    Connection(#[source] CrmError),
}

/// A table or mapping definition that was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionFailure {
    Mapping {
        /// Position in the mappings file
        index: usize,
        error: MappingValidationError,
    },
    Table {
        /// Position in the table definitions file
        index: usize,
        /// Declared table name, when it could be read
        name: Option<String>,
        error: DefinitionError,
    },
}

impl std::fmt::Display for DefinitionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapping { index, error } => write!(f, "mapping #{index}: {error}"),
            Self::Table {
                index,
                name: Some(name),
                error,
            } => write!(f, "table #{index} ('{name}'): {}", error_chain(error)),
            Self::Table {
                index,
                name: None,
                error,
            } => write!(f, "table #{index}: {}", error_chain(error)),
        }
    }
}

/// Why a single mapping failed.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error(transparent)]
    Fetch(#[from] CrmError),

    #[error(transparent)]
    Row(#[from] RowError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of processing one mapping.
#[derive(Debug)]
pub enum MappingOutcome {
    /// Rows were inserted and committed
    Synced { rows: u64 },

    /// Rows were fetched and converted but not written (dry run)
    Converted { rows: u64 },

    /// Nothing was fetched
    Skipped { reason: String },

    /// The mapping's transaction was rolled back or never opened
    Failed { error: MappingError },
}

/// Per-mapping entry of a [`SyncReport`].
#[derive(Debug)]
pub struct MappingReport {
    /// Position in the mappings file
    pub index: usize,
    pub source_object: String,
    pub destination_table: String,
    pub outcome: MappingOutcome,
}

/// Everything that happened during a run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub definition_errors: Vec<DefinitionFailure>,
    pub mappings: Vec<MappingReport>,
}

impl SyncReport {
    /// Total rows committed across all mappings.
    pub fn synced_rows(&self) -> u64 {
        self.mappings
            .iter()
            .map(|m| match m.outcome {
                MappingOutcome::Synced { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    /// Mappings that failed.
    pub fn failures(&self) -> impl Iterator<Item = &MappingReport> {
        self.mappings
            .iter()
            .filter(|m| matches!(m.outcome, MappingOutcome::Failed { .. }))
    }

    /// Whether every definition loaded and no mapping failed or was skipped.
    pub fn is_clean(&self) -> bool {
        self.definition_errors.is_empty()
            && self.mappings.iter().all(|m| {
                matches!(
                    m.outcome,
                    MappingOutcome::Synced { .. } | MappingOutcome::Converted { .. }
                )
            })
    }
}

/// Synthesize every mapping document, collecting failures by position.
pub fn synthesize_mappings(
    documents: &[Value],
    mode: MappingMode,
) -> (Vec<(usize, TableMapping)>, Vec<DefinitionFailure>) {
    let mut mappings = Vec::with_capacity(documents.len());
    let mut failures = Vec::new();

    for (index, document) in documents.iter().enumerate() {
        match synthesize_mapping(document, mode) {
            Ok(mapping) => mappings.push((index, mapping)),
            Err(error) => {
                tracing::error!(index, "Invalid mapping: {error}");
                failures.push(DefinitionFailure::Mapping { index, error });
            }
        }
    }

    (mappings, failures)
}

/// Synthesize every table definition into a registry, collecting failures
/// (including duplicate table names) by position.
pub fn synthesize_registry(documents: &[Value]) -> (SchemaRegistry, Vec<DefinitionFailure>) {
    let mut registry = SchemaRegistry::new();
    let mut failures = Vec::new();

    for (index, document) in documents.iter().enumerate() {
        let name = document
            .get("tablename")
            .and_then(Value::as_str)
            .map(str::to_string);

        let registered = synthesize_table(document).and_then(|schema| registry.register(schema));
        if let Err(error) = registered {
            tracing::error!(
                index,
                table = name.as_deref().unwrap_or("<unnamed>"),
                "Invalid table definition: {}",
                error_chain(&error)
            );
            failures.push(DefinitionFailure::Table { index, name, error });
        }
    }

    (registry, failures)
}

/// SOQL projecting a mapping's source fields.
pub fn projection_query(mapping: &TableMapping, limit: Option<u64>) -> String {
    SoqlQuery::new(mapping.source_object_name.as_str())
        .fields(&mapping.query_fields())
        .with_limit(limit)
        .to_string()
}

/// Drives one sync run from definitions to committed rows.
pub struct SyncOrchestrator<C, S> {
    client: C,
    sink: S,
    options: SyncOptions,
    table_documents: Vec<Value>,
    mapping_documents: Vec<Value>,
    mappings: Vec<(usize, TableMapping)>,
    registry: SchemaRegistry,
    report: SyncReport,
    state: SyncState,
}

impl<C: CrmClient, S: StorageSink> SyncOrchestrator<C, S> {
    pub fn new(
        client: C,
        sink: S,
        table_documents: Vec<Value>,
        mapping_documents: Vec<Value>,
        options: SyncOptions,
    ) -> Self {
        Self {
            client,
            sink,
            options,
            table_documents,
            mapping_documents,
            mappings: Vec::new(),
            registry: SchemaRegistry::new(),
            report: SyncReport::default(),
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mappings that passed validation, with their file positions.
    pub fn mappings(&self) -> &[(usize, TableMapping)] {
        &self.mappings
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The report accumulated so far.
    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    fn require(&self, operation: &'static str, allowed: bool) -> Result<(), SyncError> {
        if allowed {
            Ok(())
        } else {
            Err(SyncError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Synthesize all mappings. Returns how many were accepted.
    pub fn load_mappings(&mut self) -> Result<usize, SyncError> {
        self.require("load mappings", self.state == SyncState::Idle)?;

        let (mappings, failures) = synthesize_mappings(&self.mapping_documents, self.options.mode);
        tracing::info!(
            accepted = mappings.len(),
            rejected = failures.len(),
            "Loaded mappings"
        );
        self.mappings = mappings;
        self.report.definition_errors.extend(failures);
        self.state = SyncState::MappingsLoaded;
        Ok(self.mappings.len())
    }

    /// Synthesize all table schemas. Returns how many were registered.
    pub fn load_schemas(&mut self) -> Result<usize, SyncError> {
        self.require("load schemas", self.state == SyncState::MappingsLoaded)?;

        let (registry, failures) = synthesize_registry(&self.table_documents);
        tracing::info!(
            tables = registry.len(),
            rejected = failures.len(),
            "Loaded table schemas"
        );
        self.registry = registry;
        self.report.definition_errors.extend(failures);
        self.state = SyncState::SchemasLoaded;
        Ok(self.registry.len())
    }

    /// Log in to the CRM. Failure is fatal to the run.
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        self.require("connect", self.state == SyncState::SchemasLoaded)?;

        match self.client.login().await {
            Ok(()) => {
                tracing::info!("Connected to Salesforce");
                self.state = SyncState::Connected;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error logging in to Salesforce: {e}");
                self.state = SyncState::Failed;
                Err(SyncError::Connection(e))
            }
        }
    }

    /// Process the loaded mapping at `position` and record its outcome.
    pub async fn sync_one(&mut self, position: usize) -> Result<&MappingReport, SyncError> {
        self.require(
            "sync a mapping",
            matches!(self.state, SyncState::Connected | SyncState::Syncing(_)),
        )?;
        let (index, mapping) = self
            .mappings
            .get(position)
            .cloned()
            .ok_or(SyncError::UnknownMapping(position))?;
        self.state = SyncState::Syncing(position);

        let outcome = match self.registry.get(&mapping.destination_table_name) {
            None => {
                tracing::warn!(
                    index,
                    object = %mapping.source_object_name,
                    table = %mapping.destination_table_name,
                    "No table definition for mapping, skipping"
                );
                MappingOutcome::Skipped {
                    reason: format!(
                        "no table definition named '{}'",
                        mapping.destination_table_name
                    ),
                }
            }
            Some(schema) => {
                match transfer(&self.client, &self.sink, &self.options, &mapping, schema).await {
                    Ok(rows) if self.options.dry_run => MappingOutcome::Converted { rows },
                    Ok(rows) => {
                        tracing::info!(
                            index,
                            object = %mapping.source_object_name,
                            table = %mapping.destination_table_name,
                            rows,
                            "Stored records"
                        );
                        MappingOutcome::Synced { rows }
                    }
                    Err(error) => {
                        tracing::error!(
                            index,
                            object = %mapping.source_object_name,
                            table = %mapping.destination_table_name,
                            "Mapping failed: {error}"
                        );
                        MappingOutcome::Failed { error }
                    }
                }
            }
        };

        let entry = self.report.mappings.len();
        self.report.mappings.push(MappingReport {
            index,
            source_object: mapping.source_object_name,
            destination_table: mapping.destination_table_name,
            outcome,
        });
        Ok(&self.report.mappings[entry])
    }

    /// Run every step and hand back the report.
    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        tracing::info!("Starting sync");
        self.load_mappings()?;
        self.load_schemas()?;
        self.connect().await?;

        for position in 0..self.mappings.len() {
            self.sync_one(position).await?;
        }

        self.state = SyncState::Done;
        let report = std::mem::take(&mut self.report);
        tracing::info!(
            mappings = report.mappings.len(),
            failed = report.failures().count(),
            rows = report.synced_rows(),
            "Sync complete"
        );
        Ok(report)
    }
}

/// Fetch, convert and store one mapping. Returns the row count.
async fn transfer<C: CrmClient, S: StorageSink>(
    client: &C,
    sink: &S,
    options: &SyncOptions,
    mapping: &TableMapping,
    schema: &TableSchema,
) -> Result<u64, MappingError> {
    let soql = projection_query(mapping, options.limit);
    tracing::debug!(object = %mapping.source_object_name, "Querying: {soql}");

    let records = client.query(&soql).await?;
    tracing::debug!(
        object = %mapping.source_object_name,
        records = records.len(),
        "Fetched records"
    );

    let rows = records
        .into_iter()
        .map(|record| schema.build_row(&convert(record, mapping)))
        .collect::<Result<Vec<_>, _>>()?;

    if options.dry_run {
        tracing::info!(
            table = %schema.name(),
            rows = rows.len(),
            "Dry run: converted records, nothing written"
        );
        return Ok(rows.len() as u64);
    }

    let mut tx = sink.begin(&[schema]).await?;
    match tx.insert_all(&rows).await {
        Ok(inserted) => {
            tx.commit().await?;
            Ok(inserted)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(table = %schema.name(), "Rollback failed: {rollback}");
            }
            Err(e.into())
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_synthesize_mappings_collects_failures() {
        let documents = vec![
            json!({"salesforce-object": "Account", "db-table": "User", "column-mapping": {"Id": "ID"}}),
            json!({"salesforce-object": "Contact", "db-table": "PHONE", "column-mapping": {}}),
            json!({"salesforce-object": "Lead", "db-table": "LEAD", "column-mapping": {"Id": "ID"}}),
        ];

        let (mappings, failures) = synthesize_mappings(&documents, MappingMode::Lenient);
        assert_eq!(
            mappings.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(
            failures,
            vec![DefinitionFailure::Mapping {
                index: 1,
                error: MappingValidationError::NoColumnMappings
            }]
        );
    }

    #[test]
    fn test_synthesize_registry_rejects_duplicates_and_bad_tables() {
        let user = json!({
            "tablename": "User",
            "columns": [{"name": "ID", "type": "String", "length": 20, "primary_key": true}]
        });
        let documents = vec![
            user.clone(),
            json!({
                "tablename": "Broken",
                "columns": [
                    {"name": "a", "type": "Integer", "primary_key": true},
                    {"name": "b", "type": "Integer", "primary_key": true}
                ]
            }),
            user,
        ];

        let (registry, failures) = synthesize_registry(&documents);
        assert_eq!(registry.table_names(), vec!["User"]);
        assert_eq!(failures.len(), 2);
        assert!(matches!(
            &failures[0],
            DefinitionFailure::Table { index: 1, name: Some(name), error: DefinitionError::Schema(_) }
                if name == "Broken"
        ));
        assert!(matches!(
            &failures[1],
            DefinitionFailure::Table { index: 2, error: DefinitionError::DuplicateTable(_), .. }
        ));
        assert!(failures[0].to_string().contains("more than one primary key"));
    }

    #[test]
    fn test_projection_query() {
        let mapping = synthesize_mapping(
            &json!({
                "salesforce-object": "Account",
                "db-table": "User",
                "column-mapping": {"Id": "ID", "Name": "NAME"}
            }),
            MappingMode::Strict,
        )
        .unwrap();

        assert_eq!(
            projection_query(&mapping, None),
            "SELECT Id, Name FROM Account"
        );
        assert_eq!(
            projection_query(&mapping, Some(5)),
            "SELECT Id, Name FROM Account LIMIT 5"
        );
    }

    #[test]
    fn test_report_summary() {
        let report = SyncReport {
            definition_errors: vec![],
            mappings: vec![
                MappingReport {
                    index: 0,
                    source_object: "Account".to_string(),
                    destination_table: "User".to_string(),
                    outcome: MappingOutcome::Synced { rows: 3 },
                },
                MappingReport {
                    index: 1,
                    source_object: "Contact".to_string(),
                    destination_table: "PHONE".to_string(),
                    outcome: MappingOutcome::Failed {
                        error: MappingError::Storage(StorageError::Operation("boom".to_string())),
                    },
                },
            ],
        };

        assert_eq!(report.synced_rows(), 3);
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_clean());
    }
}
