//! CrmClient trait definition.

use crate::error::CrmError;
use sync_core::SourceRecord;

/// Trait for pulling records out of a CRM.
///
/// The orchestrator is generic over this trait; the CLI instantiates it with
/// [`crate::SalesforceClient`], integration tests with an in-memory fake.
///
/// ```ignore
/// pub async fn run<C: CrmClient>(client: &mut C) -> Result<()> {
///     client.login().await?;
///     let records = client.query("SELECT Id FROM Account").await?;
/// }
/// ```
#[async_trait::async_trait]
pub trait CrmClient: Send + Sync {
    /// Authenticate. Must succeed before [`CrmClient::query`] is called.
    async fn login(&mut self) -> Result<(), CrmError>;

    /// Run a query and return every matching record.
    ///
    /// Records are flat field maps with the `attributes` metadata removed.
    async fn query(&self, soql: &str) -> Result<Vec<SourceRecord>, CrmError>;
}
