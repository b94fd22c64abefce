//! Error types for the Salesforce source.

/// Failure talking to the CRM.
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    /// Login was rejected or returned no session
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A query was issued before a successful login
    #[error("You need to login before querying")]
    NotLoggedIn,

    /// A query could not be completed
    #[error("Error fetching data using SOQL query '{query}': {reason}")]
    Fetch { query: String, reason: String },

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl CrmError {
    pub(crate) fn fetch(query: &str, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            query: query.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Credentials document could not be turned into [`crate::Credentials`].
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// The document is not valid YAML or lacks required keys
    #[error("Issue creating Salesforce credentials: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A required value is present but empty
    #[error("Issue creating Salesforce credentials: '{0}' must not be empty")]
    Empty(&'static str),
}
