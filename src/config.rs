//! Configuration file loading.
//!
//! Definition files are read as raw JSON documents; turning them into
//! schemas and mappings is left to the orchestrator so that one bad entry
//! never hides the others.

use anyhow::Context;
use salesforce_source::Credentials;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Target database settings (`db_config.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbConfig {
    #[serde(rename = "connection-string")]
    pub connection_string: String,
}

/// Read a JSON file.
pub fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file {}", path.display()))
}

/// Read a JSON file whose top level is an array of documents.
pub fn read_json_documents(path: &Path) -> anyhow::Result<Vec<Value>> {
    match read_json(path)? {
        Value::Array(documents) => Ok(documents),
        other => anyhow::bail!(
            "Expected a JSON array at the top level of {}, found {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

/// Read and deserialize a YAML file.
pub fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read YAML file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML file {}", path.display()))
}

/// Load table definition documents.
pub fn load_table_documents(path: &Path) -> anyhow::Result<Vec<Value>> {
    let documents = read_json_documents(path).context("Failed to load table definitions")?;
    tracing::debug!("Loaded {} table definitions from {}", documents.len(), path.display());
    Ok(documents)
}

/// Load mapping documents.
pub fn load_mapping_documents(path: &Path) -> anyhow::Result<Vec<Value>> {
    let documents = read_json_documents(path).context("Failed to load mappings")?;
    tracing::debug!("Loaded {} mappings from {}", documents.len(), path.display());
    Ok(documents)
}

/// Load Salesforce credentials.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
    Credentials::from_yaml_str(&content)
        .with_context(|| format!("Invalid credentials in {}", path.display()))
}

/// Load the target database settings.
pub fn load_db_config(path: &Path) -> anyhow::Result<DbConfig> {
    let config: DbConfig = read_yaml(path)?;
    if config.connection_string.trim().is_empty() {
        anyhow::bail!("'connection-string' in {} is empty", path.display());
    }
    Ok(config)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
