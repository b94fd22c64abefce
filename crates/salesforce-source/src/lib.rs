//! Salesforce source for salesforce-sync.
//!
//! This crate defines the `CrmClient` trait the sync orchestrator pulls
//! records through, and `SalesforceClient`, its implementation over the
//! Salesforce REST API (OAuth2 username-password flow plus paginated
//! `query` calls). Tests and dry runs substitute their own `CrmClient`.
//!
//! It also carries the SOQL builder used to turn a mapping's field list
//! into a projection query.

mod client;
mod credentials;
mod error;
mod rest;
pub mod soql;

pub use client::CrmClient;
pub use credentials::Credentials;
pub use error::{CredentialsError, CrmError};
pub use rest::{SalesforceClient, DEFAULT_API_VERSION};
pub use soql::{build_query, SoqlQuery, SortOrder};
