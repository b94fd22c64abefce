//! Record conversion: CRM record -> target row.
//!
//! Conversion is a two-step pipeline:
//!
//! 1. [`normalize_record`] runs [`coerce_timestamp`] over every value of the
//!    raw record, independent of which fields the mapping selects.
//! 2. [`project`] picks `source_field -> destination_column` pairs in mapping
//!    order. Fields absent from the record become `Null`.
//!
//! [`convert`] composes both steps.

use crate::mapping::TableMapping;
use crate::values::{SourceRecord, TargetRow, UniversalValue};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

/// A source record after timestamp normalization.
pub type NormalizedRecord = IndexMap<String, UniversalValue>;

/// `2023-07-11T09:08:46.000+0000`, the datetime format of the CRM query API.
static CRM_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}[+-]\d{4}$")
        .expect("CRM timestamp pattern is valid")
});

/// Parse a CRM offset timestamp into a UTC instant.
///
/// Returns `None` for strings that do not have the exact
/// `YYYY-MM-DDTHH:MM:SS.sss±HHMM` shape or are not valid dates.
pub fn parse_crm_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if !CRM_TIMESTAMP.is_match(s) {
        return None;
    }
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Coerce a single raw value.
///
/// Strings in CRM timestamp format become [`UniversalValue::Timestamp`];
/// everything else keeps its value.
pub fn coerce_timestamp(value: serde_json::Value) -> UniversalValue {
    if let serde_json::Value::String(s) = &value {
        if let Some(ts) = parse_crm_timestamp(s) {
            return UniversalValue::Timestamp(ts);
        }
    }
    UniversalValue::from(value)
}

/// Apply [`coerce_timestamp`] to every value of a raw record.
pub fn normalize_record(record: SourceRecord) -> NormalizedRecord {
    record
        .into_iter()
        .map(|(key, value)| (key, coerce_timestamp(value)))
        .collect()
}

/// Project a normalized record onto a mapping's destination columns.
pub fn project(record: &NormalizedRecord, mapping: &TableMapping) -> TargetRow {
    let mut row = TargetRow::new(mapping.destination_table_name.as_str());
    for pair in &mapping.column_mappings {
        let value = record
            .get(&pair.source_field)
            .cloned()
            .unwrap_or(UniversalValue::Null);
        row.set(pair.destination_column.as_str(), value);
    }
    row
}

/// Convert one CRM record into a row for the mapping's destination table.
pub fn convert(record: SourceRecord, mapping: &TableMapping) -> TargetRow {
    project(&normalize_record(record), mapping)
}
