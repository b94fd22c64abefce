//! Salesforce REST API client.

use crate::client::CrmClient;
use crate::credentials::Credentials;
use crate::error::CrmError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use sync_core::SourceRecord;

/// REST API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "v59.0";

const TOKEN_PATH: &str = "/services/oauth2/token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    instance_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    total_size: u64,
    done: bool,
    #[serde(default)]
    records: Vec<SourceRecord>,
    next_records_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    message: String,
    #[serde(default)]
    error_code: String,
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    instance_url: String,
}

/// [`CrmClient`] over the Salesforce REST API.
pub struct SalesforceClient {
    http: Client,
    credentials: Credentials,
    login_url: String,
    api_version: String,
    session: Option<Session>,
}

impl SalesforceClient {
    /// Create a client for the given credentials. No network I/O happens
    /// until [`CrmClient::login`].
    pub fn new(credentials: Credentials) -> Result<Self, CrmError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(CrmError::Client)?;

        Ok(Self {
            http,
            login_url: credentials.login_url(),
            credentials,
            api_version: DEFAULT_API_VERSION.to_string(),
            session: None,
        })
    }

    /// Use a specific REST API version, e.g. `v60.0`.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        let api_version = api_version.into();
        self.api_version = if api_version.starts_with('v') {
            api_version
        } else {
            format!("v{api_version}")
        };
        self
    }

    /// Override the login host base URL.
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether [`CrmClient::login`] has succeeded.
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Fetch the first page of `soql`, or the page at `next_records_url`.
    async fn fetch_page(
        &self,
        session: &Session,
        soql: &str,
        next_records_url: Option<&str>,
    ) -> Result<QueryPage, CrmError> {
        let request = match next_records_url {
            Some(next) => self.http.get(format!("{}{next}", session.instance_url)),
            None => self
                .http
                .get(format!(
                    "{}/services/data/{}/query",
                    session.instance_url, self.api_version
                ))
                .query(&[("q", soql)]),
        };

        let response = request
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| CrmError::fetch(soql, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<Vec<ApiError>>(&body) {
                Ok(errors) if !errors.is_empty() => errors
                    .iter()
                    .map(|e| format!("{}: {}", e.error_code, e.message))
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => format!("status {status}: {body}"),
            };
            return Err(CrmError::fetch(soql, reason));
        }

        response
            .json::<QueryPage>()
            .await
            .map_err(|e| CrmError::fetch(soql, format!("malformed query response: {e}")))
    }
}

#[async_trait::async_trait]
impl CrmClient for SalesforceClient {
    async fn login(&mut self) -> Result<(), CrmError> {
        let token_url = format!("{}{TOKEN_PATH}", self.login_url);
        tracing::debug!(username = %self.credentials.username, "Logging in at {token_url}");

        let password = format!(
            "{}{}",
            self.credentials.password, self.credentials.security_token
        );
        let form = [
            ("grant_type", "password"),
            ("client_id", self.credentials.consumer_key.as_str()),
            ("client_secret", self.credentials.consumer_secret.as_str()),
            ("username", self.credentials.username.as_str()),
            ("password", password.as_str()),
        ];

        let response = self
            .http
            .post(&token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CrmError::Authentication(format!("request to '{token_url}' failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrmError::Authentication(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenError>(&body) {
                Ok(err) if err.error_description.is_empty() => err.error,
                Ok(err) => format!("{}: {}", err.error, err.error_description),
                Err(_) => format!("status {status}: {body}"),
            };
            return Err(CrmError::Authentication(reason));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CrmError::Authentication(format!("malformed token response: {e}")))?;

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CrmError::Authentication("No session id returned".to_string()))?;
        let instance_url = token
            .instance_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CrmError::Authentication("No instance URL returned".to_string()))?;

        tracing::info!(instance_url = %instance_url, "Logged in to Salesforce");
        self.session = Some(Session {
            access_token,
            instance_url: instance_url.trim_end_matches('/').to_string(),
        });
        Ok(())
    }

    async fn query(&self, soql: &str) -> Result<Vec<SourceRecord>, CrmError> {
        let session = self.session.as_ref().ok_or(CrmError::NotLoggedIn)?;

        let mut next_records_url: Option<String> = None;
        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .fetch_page(session, soql, next_records_url.as_deref())
                .await?;
            pages += 1;
            tracing::debug!(
                page = pages,
                total_size = page.total_size,
                received = page.records.len(),
                "Fetched query page"
            );

            records.extend(page.records.into_iter().map(strip_attributes));

            match (page.done, page.next_records_url) {
                (false, Some(next)) => next_records_url = Some(next),
                (false, None) => {
                    return Err(CrmError::fetch(
                        soql,
                        format!(
                            "response not done but no nextRecordsUrl after {} of {} records",
                            records.len(),
                            page.total_size
                        ),
                    ));
                }
                (true, _) => break,
            }
        }

        tracing::debug!(records = records.len(), pages, "Query complete");
        Ok(records)
    }
}

/// Drop the `attributes` key, which only describes the object type and URL.
fn strip_attributes(mut record: SourceRecord) -> SourceRecord {
    record.shift_remove("attributes");
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials::from_yaml_str(
            "username: u@example.com\npassword: pw\nsecurity_token: TOKEN\nconsumer_key: key\nconsumer_secret: secret\n",
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("password=pwTOKEN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "00Dxx!token",
                "instance_url": server.uri(),
                "token_type": "Bearer"
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> SalesforceClient {
        SalesforceClient::new(credentials())
            .unwrap()
            .with_login_url(server.uri())
    }

    #[test]
    fn test_api_version_prefix() {
        let c = SalesforceClient::new(credentials()).unwrap().with_api_version("60.0");
        assert_eq!(c.api_version, "v60.0");
        let c = SalesforceClient::new(credentials()).unwrap().with_api_version("v58.0");
        assert_eq!(c.api_version, "v58.0");
    }

    #[test]
    fn test_strip_attributes() {
        let record = json!({
            "attributes": {"type": "Account", "url": "/services/data/v59.0/sobjects/Account/001"},
            "Id": "001",
            "Name": "Acme"
        });
        let stripped = strip_attributes(record.as_object().cloned().unwrap());
        assert_eq!(stripped.keys().collect::<Vec<_>>(), vec!["Id", "Name"]);
    }

    #[tokio::test]
    async fn test_query_before_login_fails() {
        let c = SalesforceClient::new(credentials()).unwrap();
        assert!(!c.is_logged_in());
        let err = c.query("SELECT Id FROM Account").await.unwrap_err();
        assert!(matches!(err, CrmError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_login_and_paginated_query() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/query"))
            .and(query_param("q", "SELECT Id, Name FROM Account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalSize": 3,
                "done": false,
                "nextRecordsUrl": "/services/data/v59.0/query/01gxx-2000",
                "records": [
                    {"attributes": {"type": "Account"}, "Id": "001", "Name": "Acme"},
                    {"attributes": {"type": "Account"}, "Id": "002", "Name": "Globex"}
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/query/01gxx-2000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalSize": 3,
                "done": true,
                "records": [
                    {"attributes": {"type": "Account"}, "Id": "003", "Name": null}
                ]
            })))
            .mount(&server)
            .await;

        let mut c = client(&server);
        c.login().await.unwrap();
        assert!(c.is_logged_in());

        let records = c.query("SELECT Id, Name FROM Account").await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("Id"), Some(&json!("001")));
        assert_eq!(records[2].get("Name"), Some(&json!(null)));
        assert!(records.iter().all(|r| !r.contains_key("attributes")));
    }

    #[tokio::test]
    async fn test_unfinished_query_without_next_page_fails() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalSize": 5000,
                "done": false,
                "records": [{"attributes": {"type": "Account"}, "Id": "001"}]
            })))
            .mount(&server)
            .await;

        let mut c = client(&server);
        c.login().await.unwrap();
        let err = c.query("SELECT Id FROM Account").await.unwrap_err();
        match err {
            CrmError::Fetch { query, reason } => {
                assert_eq!(query, "SELECT Id FROM Account");
                assert!(reason.contains("nextRecordsUrl"), "{reason}");
                assert!(reason.contains("1 of 5000"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "authentication failure"
            })))
            .mount(&server)
            .await;

        let mut c = client(&server);
        let err = c.login().await.unwrap_err();
        match err {
            CrmError::Authentication(reason) => {
                assert_eq!(reason, "invalid_grant: authentication failure")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!c.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_without_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instance_url": server.uri()
            })))
            .mount(&server)
            .await;

        let err = client(&server).login().await.unwrap_err();
        assert!(matches!(err, CrmError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_query_error_status_is_fetch_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/query"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!([{
                "message": "No such column 'Foo' on entity 'Account'",
                "errorCode": "INVALID_FIELD"
            }])))
            .mount(&server)
            .await;

        let mut c = client(&server);
        c.login().await.unwrap();
        let err = c.query("SELECT Foo FROM Account").await.unwrap_err();
        match err {
            CrmError::Fetch { query, reason } => {
                assert_eq!(query, "SELECT Foo FROM Account");
                assert!(reason.starts_with("INVALID_FIELD"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
