//! SOQL query construction.
//!
//! [`build_query`] covers the sync path: a plain projection of the mapped
//! fields. [`SoqlQuery`] adds filters, ordering and a row limit.

use std::fmt;

/// Build `SELECT a, b FROM Object`.
pub fn build_query<S: AsRef<str>>(object_name: &str, columns: &[S]) -> String {
    SoqlQuery::new(object_name).fields(columns).to_string()
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("ASC"),
            Self::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    field: String,
    operator: String,
    value: String,
}

/// SELECT statement builder.
///
/// ```rust
/// use salesforce_source::{SoqlQuery, SortOrder};
///
/// let soql = SoqlQuery::new("Account")
///     .fields(&["Id", "Name"])
///     .filter("LastModifiedDate", ">=", "2023-01-01T00:00:00Z")
///     .order_by("LastModifiedDate", SortOrder::Desc)
///     .limit(50);
///
/// assert_eq!(
///     soql.to_string(),
///     "SELECT Id, Name FROM Account WHERE LastModifiedDate >= '2023-01-01T00:00:00Z' \
///      ORDER BY LastModifiedDate DESC LIMIT 50"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoqlQuery {
    object_name: String,
    fields: Vec<String>,
    conditions: Vec<Condition>,
    order_by: Option<(String, SortOrder)>,
    limit: Option<u64>,
}

impl SoqlQuery {
    /// Start a query against an object.
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            fields: Vec::new(),
            conditions: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Append fields to the projection.
    pub fn fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields
            .extend(fields.iter().map(|f| f.as_ref().to_string()));
        self
    }

    /// Add a `field operator 'value'` condition. Conditions are AND-joined.
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        });
        self
    }

    /// Set the `ORDER BY` clause.
    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    /// Set the `LIMIT` clause.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set or clear the `LIMIT` clause.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }
}

impl fmt::Display for SoqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // An empty projection selects every field
        if self.fields.is_empty() {
            write!(f, "SELECT FIELDS(ALL) FROM {}", self.object_name)?;
        } else {
            write!(
                f,
                "SELECT {} FROM {}",
                self.fields.join(", "),
                self.object_name
            )?;
        }

        if !self.conditions.is_empty() {
            let conditions: Vec<String> = self
                .conditions
                .iter()
                .map(|c| format!("{} {} '{}'", c.field, c.operator, quote(&c.value)))
                .collect();
            write!(f, " WHERE {}", conditions.join(" AND "))?;
        }

        if let Some((field, order)) = &self.order_by {
            write!(f, " ORDER BY {field} {order}")?;
        }

        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }

        Ok(())
    }
}

/// Escape a value for use inside a single-quoted SOQL literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
