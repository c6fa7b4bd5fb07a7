//! remote::http
//!
//! HTTP backend implementation over the content platform's REST API.
//!
//! # Design
//!
//! Each call chain opens its own session: `connect` performs an OAuth2
//! password grant and the resulting bearer token lives only as long as the
//! session (and the datastores/branches derived from it) is referenced.
//!
//! Endpoints used:
//! - `POST {baseURL}/oauth/token` (client credentials via basic auth)
//! - `GET  {baseURL}/stacks/find/application/{application}`
//! - `GET  {baseURL}/stacks/{stack}/datastores`
//! - `POST {baseURL}/repositories/{repository}/branches/query`
//! - `POST {baseURL}/repositories/{repository}/branches/{branch}/nodes/query`
//!
//! Pagination options become query parameters of the node query; string
//! values are sent as-is and structured values (e.g. `sort`) JSON-encoded.
//!
//! # Error Mapping
//!
//! - transport failures, 401 and 403 → `Connection`
//! - 404 while resolving a datastore → `DatastoreNotFound`
//! - any other non-success on a query → `Query`
//!
//! There is no retry; one failed request fails the call chain.
//!
//! # Example
//!
//! ```ignore
//! use cms_facade::remote::http::HttpConnector;
//! use cms_facade::remote::Connector;
//!
//! let connector = HttpConnector::new()?;
//! let session = connector.connect("acme", &credentials).await?;
//! let content = session.datastore("content").await?;
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::traits::{
    Branch, BranchMap, CmsError, Connector, Datastore, NodeMap, Pagination, Session,
};
use crate::config::Config;
use crate::credentials::Credentials;

/// OAuth scope requested for API sessions.
const API_SCOPE: &str = "api";

/// Datastore type that holds branches.
const REPOSITORY_DATASTORE_TYPE: &str = "repository";

/// Connector talking to the backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    /// HTTP client shared by every session
    client: Client,
}

impl HttpConnector {
    /// Create a connector with default timeout and User-Agent.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, CmsError> {
        Self::from_config(&Config::default())
    }

    /// Create a connector using the `[http]` settings of `config`.
    pub fn from_config(config: &Config) -> Result<Self, CmsError> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| CmsError::Connection(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<String, CmsError> {
        let url = format!("{}/oauth/token", trim_base(&credentials.base_url));

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.client_key, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("scope", API_SCOPE),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(CmsError::Connection(format!(
                "authentication rejected ({}): {}",
                status.as_u16(),
                message
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            CmsError::Connection(format!("failed to parse token response: {}", e))
        })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn connect(
        &self,
        project: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn Session>, CmsError> {
        let access_token = self.request_token(credentials).await?;
        debug!(project, base_url = %credentials.base_url, "authenticated session");

        Ok(Arc::new(HttpSession {
            ctx: Arc::new(HttpContext {
                client: self.client.clone(),
                base_url: trim_base(&credentials.base_url).to_string(),
                access_token,
            }),
            project: project.to_string(),
            application: credentials.application.clone(),
        }))
    }
}

/// Shared per-session state.
struct HttpContext {
    client: Client,
    base_url: String,
    access_token: String,
}

// Custom Debug to avoid exposing the access token
impl fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContext")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl HttpContext {
    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.access_token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.access_token)
    }
}

/// Session opened by [`HttpConnector`].
#[derive(Debug)]
struct HttpSession {
    ctx: Arc<HttpContext>,
    project: String,
    application: Option<String>,
}

impl HttpSession {
    /// Map a failed datastore lookup response.
    async fn lookup_error(&self, response: Response, name: &str) -> CmsError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return self.not_found(name);
        }
        let message = error_message(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CmsError::Connection(format!("access denied ({}): {}", status.as_u16(), message))
            }
            _ => CmsError::Connection(format!(
                "datastore lookup failed ({}): {}",
                status.as_u16(),
                message
            )),
        }
    }

    fn not_found(&self, name: &str) -> CmsError {
        CmsError::DatastoreNotFound {
            project: self.project.clone(),
            datastore: name.to_string(),
        }
    }
}

#[async_trait]
impl Session for HttpSession {
    fn project(&self) -> &str {
        &self.project
    }

    async fn datastore(&self, name: &str) -> Result<Arc<dyn Datastore>, CmsError> {
        let application = self.application.as_deref().ok_or_else(|| {
            CmsError::Connection(format!(
                "credentials for project '{}' name no application",
                self.project
            ))
        })?;

        let response = self
            .ctx
            .get(&format!("stacks/find/application/{}", application))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(self.lookup_error(response, name).await);
        }
        let stack: DocRef = parse_json(response, CmsError::Connection).await?;

        let response = self
            .ctx
            .get(&format!("stacks/{}/datastores", stack.id))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(self.lookup_error(response, name).await);
        }
        let listing: Rows<DatastoreRow> = parse_json(response, CmsError::Connection).await?;

        let row = listing
            .rows
            .into_iter()
            .find(|row| {
                row.key == name
                    && row
                        .datastore_type_id
                        .as_deref()
                        .map_or(true, |t| t == REPOSITORY_DATASTORE_TYPE)
            })
            .ok_or_else(|| self.not_found(name))?;

        debug!(project = %self.project, datastore = name, repository = %row.datastore_id, "resolved datastore");

        Ok(Arc::new(HttpDatastore {
            ctx: Arc::clone(&self.ctx),
            name: name.to_string(),
            repository_id: row.datastore_id,
        }))
    }
}

/// Repository-backed datastore.
#[derive(Debug, Clone)]
struct HttpDatastore {
    ctx: Arc<HttpContext>,
    name: String,
    repository_id: String,
}

#[async_trait]
impl Datastore for HttpDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query_branches(&self, filter: &Value) -> Result<BranchMap, CmsError> {
        let response = self
            .ctx
            .post(&format!("repositories/{}/branches/query", self.repository_id))
            .json(filter)
            .send()
            .await
            .map_err(transport_error)?;

        let rows: Rows<BranchRow> = query_response(response).await?;
        let handle: Arc<dyn Datastore> = Arc::new(self.clone());

        Ok(rows
            .rows
            .into_iter()
            .map(|row| {
                let mut branch = Branch::new(row.id.clone(), row.branch_type, Arc::clone(&handle));
                branch.archived = row.archived;
                branch.snapshot = row.snapshot;
                branch.title = row.title;
                (row.id, branch)
            })
            .collect())
    }

    async fn query_nodes(
        &self,
        branch_id: &str,
        query: &Value,
        pagination: &Pagination,
    ) -> Result<NodeMap, CmsError> {
        let response = self
            .ctx
            .post(&format!(
                "repositories/{}/branches/{}/nodes/query",
                self.repository_id, branch_id
            ))
            .query(&pagination_params(pagination))
            .json(query)
            .send()
            .await
            .map_err(transport_error)?;

        let rows: Rows<Value> = query_response(response).await?;
        rows.rows
            .into_iter()
            .map(|node| {
                let id = node
                    .get("_doc")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| CmsError::Query("node without _doc identifier".into()))?;
                Ok((id, node))
            })
            .collect()
    }
}

/// Render pagination options as query parameters.
pub fn pagination_params(pagination: &Pagination) -> Vec<(String, String)> {
    pagination
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

fn transport_error(e: reqwest::Error) -> CmsError {
    CmsError::Connection(format!("transport failure: {}", e))
}

/// Handle a query response, mapping errors appropriately.
async fn query_response<T: DeserializeOwned>(response: Response) -> Result<T, CmsError> {
    let status = response.status();
    if status.is_success() {
        return parse_json(response, CmsError::Query).await;
    }

    let message = error_message(response).await;
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CmsError::Connection(format!("access denied ({}): {}", status.as_u16(), message))
        }
        _ => CmsError::Query(format!("{} - {}", status.as_u16(), message)),
    })
}

async fn parse_json<T: DeserializeOwned>(
    response: Response,
    wrap: fn(String) -> CmsError,
) -> Result<T, CmsError> {
    response
        .json()
        .await
        .map_err(|e| wrap(format!("failed to parse response: {}", e)))
}

/// Try to get the error message from the body.
async fn error_message(response: Response) -> String {
    match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            message: Some(message),
        }) => message,
        _ => "Unknown error".to_string(),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct Rows<T> {
    #[serde(default = "Vec::new")]
    rows: Vec<T>,
}

#[derive(Deserialize)]
struct DocRef {
    #[serde(rename = "_doc")]
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatastoreRow {
    key: String,
    datastore_id: String,
    datastore_type_id: Option<String>,
}

#[derive(Deserialize)]
struct BranchRow {
    #[serde(rename = "_doc")]
    id: String,
    #[serde(rename = "type", default)]
    branch_type: String,
    archived: Option<bool>,
    snapshot: Option<bool>,
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination_params_render_scalars_and_json() {
        let pagination = Pagination::new()
            .limit(10)
            .skip(20)
            .sort(json!({"title": 1}))
            .with("locale", "en_US");
        let mut params = pagination_params(&pagination);
        params.sort();

        assert_eq!(
            params,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("locale".to_string(), "en_US".to_string()),
                ("skip".to_string(), "20".to_string()),
                ("sort".to_string(), r#"{"title":1}"#.to_string()),
            ]
        );
    }

    #[test]
    fn empty_pagination_has_no_params() {
        assert!(pagination_params(&Pagination::new()).is_empty());
    }

    #[test]
    fn trim_base_strips_trailing_slashes() {
        assert_eq!(trim_base("https://api.example.com/"), "https://api.example.com");
        assert_eq!(trim_base("https://api.example.com"), "https://api.example.com");
    }

    #[test]
    fn branch_row_parses_optional_flags() {
        let row: BranchRow = serde_json::from_value(json!({
            "_doc": "b1",
            "type": "MASTER",
            "title": "Master"
        }))
        .expect("parse");
        assert_eq!(row.id, "b1");
        assert_eq!(row.branch_type, "MASTER");
        assert!(row.archived.is_none());
        assert!(row.snapshot.is_none());
    }

    #[test]
    fn context_debug_redacts_token() {
        let ctx = HttpContext {
            client: Client::new(),
            base_url: "https://api.example.com".into(),
            access_token: "secret-token".into(),
        };
        let debug = format!("{:?}", ctx);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn connector_builds_from_default_config() {
        let connector = HttpConnector::new().expect("build connector");
        assert_eq!(connector.name(), "http");
    }
}
