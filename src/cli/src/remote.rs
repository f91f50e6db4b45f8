//! HTTP transport for the backoffice API.
//!
//! Every call carries the session credentials (cookie store plus an optional
//! bearer token). POST, PATCH and PUT bodies are sent as JSON. A 401 from any
//! endpoint fires the [`OnUnauthorized`] hook with the login location before
//! the response is handed back, so callers never need to special-case it.

use reqwest::{header, Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Path appended to the base URL when no login location is configured.
pub const LOGIN_PATH: &str = "/login";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Called with the login location whenever the server answers 401.
pub type OnUnauthorized = Arc<dyn Fn(&str) + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Status and decoded JSON body of one API call.
///
/// Empty bodies decode to `null`; bodies that are not JSON are kept as a
/// string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    /// The server's user-facing error message, if the body carries one.
    pub fn error_message(&self) -> Option<&str> {
        self.body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
    }

    fn from_bytes(status: u16, bytes: &[u8]) -> Self {
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
        };
        Self { status, body }
    }
}

impl fmt::Display for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_message() {
            Some(message) => write!(f, "HTTP {}: {}", self.status, message),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════════════

/// Credential-bearing HTTP client shared by every resource cache.
#[derive(Clone)]
pub struct RemoteResourceClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    login_url: String,
    on_unauthorized: Option<OnUnauthorized>,
}

impl fmt::Debug for RemoteResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResourceClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .field("login_url", &self.login_url)
            .finish()
    }
}

impl RemoteResourceClient {
    /// Client with default settings and no unauthorized hook.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: &str) -> RemoteResourceClientBuilder {
        RemoteResourceClientBuilder {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            login_url: None,
            on_unauthorized: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, &[], None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, &[], None).await
    }

    /// DELETE with query values; a key may repeat to send several values.
    pub async fn delete_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, query, None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path);
        reqwest::Url::parse(&url).map_err(|_| ClientError::InvalidUrl(url.clone()))?;

        let mutating = matches!(method, Method::POST | Method::PATCH | Method::PUT);
        let mut request = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if mutating {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        tracing::debug!(method = %method, url = %url, "Sending request");

        let response = request.send().await.map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        let response = ApiResponse::from_bytes(status, &bytes);

        if response.is_unauthorized() {
            tracing::warn!(url = %url, login = %self.login_url, "Session rejected, redirecting to login");
            if let Some(hook) = &self.on_unauthorized {
                hook(&self.login_url);
            }
        }

        Ok(response)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

pub struct RemoteResourceClientBuilder {
    base_url: String,
    token: Option<String>,
    login_url: Option<String>,
    on_unauthorized: Option<OnUnauthorized>,
    timeout: Duration,
}

impl RemoteResourceClientBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn maybe_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }

    pub fn on_unauthorized<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RemoteResourceClient> {
        reqwest::Url::parse(&self.base_url).map_err(|_| ClientError::InvalidUrl(self.base_url.clone()))?;

        let http = Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()
            .map_err(ClientError::Build)?;

        let login_url = self
            .login_url
            .unwrap_or_else(|| format!("{}{}", self.base_url, LOGIN_PATH));

        Ok(RemoteResourceClient {
            http,
            base_url: self.base_url,
            token: self.token,
            login_url,
            on_unauthorized: self.on_unauthorized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joins_paths() {
        let client = RemoteResourceClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.url("/roles"), "http://localhost:8080/roles");
        assert_eq!(client.url("roles/1"), "http://localhost:8080/roles/1");
        assert_eq!(client.login_url(), "http://localhost:8080/login");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            RemoteResourceClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_response_body_decoding() {
        assert_eq!(ApiResponse::from_bytes(200, b"").body, Value::Null);
        assert_eq!(ApiResponse::from_bytes(200, br#"{"a":1}"#).body, json!({"a": 1}));
        assert_eq!(ApiResponse::from_bytes(502, b"Bad Gateway").body, json!("Bad Gateway"));
    }

    #[test]
    fn test_error_message() {
        let response = ApiResponse::new(403, json!({"success": false, "error": {"message": "Not allowed"}}));
        assert!(response.is_forbidden());
        assert_eq!(response.error_message(), Some("Not allowed"));
        assert_eq!(response.to_string(), "HTTP 403: Not allowed");
    }
}
