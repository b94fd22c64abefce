//! Salesforce connected-app credentials.

use crate::error::CredentialsError;
use serde::Deserialize;
use std::fmt;

const PRODUCTION_DOMAIN: &str = "login";
const SANDBOX_DOMAIN: &str = "test";

/// Credentials for the OAuth2 username-password flow.
///
/// # YAML Format
///
/// ```yaml
/// username: integration@example.com
/// password: hunter2
/// security_token: XXXXXXXX
/// consumer_key: 3MVG9...
/// consumer_secret: 1234...
/// domain: login        # or `is_prod: false` for test.salesforce.com
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// May be empty when the org trusts the caller's IP range
    pub security_token: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Login host prefix: `login`, `test`, or a My Domain name
    pub domain: String,
}

#[derive(Deserialize)]
struct RawCredentials {
    username: String,
    password: String,
    #[serde(default)]
    security_token: String,
    consumer_key: String,
    consumer_secret: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    is_prod: Option<bool>,
}

impl Credentials {
    /// Parse credentials from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CredentialsError> {
        let raw: RawCredentials = serde_yaml::from_str(yaml)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawCredentials) -> Result<Self, CredentialsError> {
        for (key, value) in [
            ("username", &raw.username),
            ("password", &raw.password),
            ("consumer_key", &raw.consumer_key),
            ("consumer_secret", &raw.consumer_secret),
        ] {
            if value.trim().is_empty() {
                return Err(CredentialsError::Empty(key));
            }
        }

        let domain = match (raw.domain, raw.is_prod) {
            (Some(domain), _) if !domain.trim().is_empty() => domain.trim().to_string(),
            (Some(_), _) => return Err(CredentialsError::Empty("domain")),
            (None, Some(false)) => SANDBOX_DOMAIN.to_string(),
            (None, _) => PRODUCTION_DOMAIN.to_string(),
        };

        Ok(Self {
            username: raw.username,
            password: raw.password,
            security_token: raw.security_token,
            consumer_key: raw.consumer_key,
            consumer_secret: raw.consumer_secret,
            domain,
        })
    }

    /// Base URL of the login host, e.g. `https://login.salesforce.com`.
    pub fn login_url(&self) -> String {
        format!("https://{}.salesforce.com", self.domain)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security_token", &"<redacted>")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}
