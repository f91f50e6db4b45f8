//! Authentication middleware.
//!
//! Features:
//! - HS256 JWT validation with issuer check and leeway
//! - Credentials from an `Authorization: Bearer` header or the session cookie
//! - Public paths that bypass authentication
//! - Request context injection for the pipeline's permission check
//!
//! # Example
//!
//! ```rust,ignore
//! use backoffice_core::middleware::auth::{AuthConfig, AuthLayer};
//!
//! let config = AuthConfig::builder()
//!     .jwt_secret("your-secret-key")
//!     .build();
//!
//! let app = Router::new()
//!     .route("/roles", get(list_roles))
//!     .layer(AuthLayer::from_config(config)?);
//! ```

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthSettings;
use crate::rbac::{Permission, PermissionSet};

// ═══════════════════════════════════════════════════════════════════════════════
// Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication credentials")]
    MissingCredentials,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication credentials are required",
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "The provided token is invalid",
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "The authentication token has expired",
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An authentication error occurred",
            ),
        };

        counter!(
            "auth_errors_total",
            "error_type" => code.to_string()
        )
        .increment(1);

        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JWT Claims
// ═══════════════════════════════════════════════════════════════════════════════

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Granted permission strings, `*` for everything
    #[serde(default)]
    pub permissions: Vec<String>,

    /// JWT ID (unique identifier for this token)
    #[serde(default = "generate_jti")]
    pub jti: String,

    pub iat: i64,

    pub exp: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

fn generate_jti() -> String {
    Uuid::new_v4().to_string()
}

impl Claims {
    pub fn builder(user_id: impl Into<String>) -> ClaimsBuilder {
        ClaimsBuilder::new(user_id)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Builder for JWT claims.
pub struct ClaimsBuilder {
    claims: Claims,
}

impl ClaimsBuilder {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            claims: Claims {
                sub: user_id.into(),
                email: None,
                permissions: Vec::new(),
                jti: generate_jti(),
                iat: now.timestamp(),
                exp: (now + Duration::hours(1)).timestamp(),
                iss: None,
            },
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.claims.email = Some(email.into());
        self
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claims.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn grant(mut self, permission: Permission) -> Self {
        self.claims.permissions.push(permission.to_string());
        self
    }

    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.claims.exp = (Utc::now() + duration).timestamp();
        self
    }

    /// Pin `iat`/`exp` to explicit instants.
    pub fn window(mut self, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        self.claims.iat = issued_at.timestamp();
        self.claims.exp = expires_at.timestamp();
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.claims.iss = Some(issuer.into());
        self
    }

    pub fn build(self) -> Claims {
        self.claims
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Whether authentication is enabled. When disabled every request runs
    /// with full permissions.
    pub enabled: bool,

    pub jwt_secret: Option<String>,

    /// Expected `iss` claim; also stamped on minted tokens
    pub issuer: Option<String>,

    /// Leeway for token expiration (in seconds)
    pub leeway_secs: u64,

    /// Lifetime of minted tokens
    pub token_ttl: Duration,

    /// Paths that don't require authentication
    pub public_paths: Vec<String>,

    /// Cookie consulted when no bearer header is present
    pub session_cookie: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: None,
            issuer: None,
            leeway_secs: 60,
            token_ttl: Duration::hours(8),
            public_paths: vec!["/health".to_string(), "/metrics".to_string()],
            session_cookie: "session".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }
}

impl From<&AuthSettings> for AuthConfig {
    fn from(settings: &AuthSettings) -> Self {
        let secret = (!settings.jwt_secret.is_empty()).then(|| settings.jwt_secret.clone());
        let issuer = (!settings.jwt_issuer.is_empty()).then(|| settings.jwt_issuer.clone());
        Self {
            enabled: settings.enabled,
            jwt_secret: secret,
            issuer,
            token_ttl: Duration::seconds(i64::try_from(settings.token_ttl_secs).unwrap_or(i64::MAX / 1000)),
            session_cookie: settings.session_cookie.clone(),
            ..Default::default()
        }
    }
}

/// Builder for auth configuration.
#[derive(Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = Some(issuer.into());
        self
    }

    pub fn leeway_secs(mut self, secs: u64) -> Self {
        self.config.leeway_secs = secs;
        self
    }

    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.config.token_ttl = ttl;
        self
    }

    pub fn add_public_path(mut self, path: impl Into<String>) -> Self {
        self.config.public_paths.push(path.into());
        self
    }

    pub fn session_cookie(mut self, name: impl Into<String>) -> Self {
        self.config.session_cookie = name.into();
        self
    }

    pub fn build(self) -> AuthConfig {
        self.config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authentication Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication context injected into requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,

    pub email: Option<String>,

    pub permissions: PermissionSet,

    pub auth_method: AuthMethod,

    /// JWT ID for bearer and cookie logins
    pub token_id: Option<String>,

    pub expires_at: Option<DateTime<Utc>>,

    /// Request ID for tracing
    pub request_id: String,
}

/// How the caller was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer,
    Cookie,
    /// Authentication is disabled
    Unrestricted,
    Anonymous,
}

impl AuthContext {
    pub fn from_claims(claims: Claims, method: AuthMethod, request_id: String) -> Self {
        let expires_at = claims.expires_at();
        Self {
            user_id: claims.sub,
            email: claims.email,
            permissions: claims.permissions.into(),
            auth_method: method,
            token_id: Some(claims.jti),
            expires_at: Some(expires_at),
            request_id,
        }
    }

    /// A caller on a public path. Holds no permissions.
    pub fn anonymous(request_id: String) -> Self {
        Self {
            user_id: "anonymous".to_string(),
            email: None,
            permissions: PermissionSet::new(),
            auth_method: AuthMethod::Anonymous,
            token_id: None,
            expires_at: None,
            request_id,
        }
    }

    /// The caller used when authentication is disabled.
    pub fn superuser(request_id: String) -> Self {
        Self {
            user_id: "anonymous".to_string(),
            permissions: PermissionSet::everything(),
            auth_method: AuthMethod::Unrestricted,
            ..Self::anonymous(request_id)
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.grants(permission)
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_method != AuthMethod::Anonymous
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authenticator
// ═══════════════════════════════════════════════════════════════════════════════

/// Validates credentials and mints tokens.
pub struct Authenticator {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    /// A secret is required unless authentication is disabled.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let secret = match (&config.jwt_secret, config.enabled) {
            (Some(secret), _) => secret.clone(),
            (None, false) => Uuid::new_v4().to_string(),
            (None, true) => return Err(AuthError::Internal("JWT secret required".into())),
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            config,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.config.public_paths.iter().any(|p| match p.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == p,
        })
    }

    /// Authenticate from request headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let request_id = request_id(headers);

        if let Some(token) = extract_bearer(headers) {
            return self.validate_jwt(&token, AuthMethod::Bearer, request_id);
        }

        if let Some(token) = extract_cookie(headers, &self.config.session_cookie) {
            return self.validate_jwt(&token, AuthMethod::Cookie, request_id);
        }

        Err(AuthError::MissingCredentials)
    }

    fn validate_jwt(&self, token: &str, method: AuthMethod, request_id: String) -> Result<AuthContext, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("JWT validation failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        counter!(
            "auth_success_total",
            "method" => format!("{:?}", method).to_lowercase()
        )
        .increment(1);

        Ok(AuthContext::from_claims(token_data.claims, method, request_id))
    }

    /// Sign the given claims.
    pub fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Mint a token with the configured issuer and lifetime.
    pub fn issue<I, S>(&self, user_id: &str, email: Option<&str>, permissions: I) -> Result<String, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Claims::builder(user_id)
            .permissions(permissions)
            .expires_in(self.config.token_ttl);
        if let Some(email) = email {
            builder = builder.email(email);
        }
        if let Some(ref issuer) = self.config.issuer {
            builder = builder.issuer(issuer);
        }
        self.generate_token(&builder.build())
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| {
            s.strip_prefix("Bearer ")
                .or_else(|| s.strip_prefix("bearer "))
                .map(|s| s.trim().to_string())
        })
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
}

impl AuthLayer {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }

    pub fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        let authenticator = Authenticator::new(config)?;
        Ok(Self::new(Arc::new(authenticator)))
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !authenticator.config.enabled {
                let context = AuthContext::superuser(request_id(request.headers()));
                request.extensions_mut().insert(context);
                return inner.call(request).await;
            }

            if authenticator.is_public_path(request.uri().path()) {
                let context = AuthContext::anonymous(request_id(request.headers()));
                request.extensions_mut().insert(context);
                return inner.call(request).await;
            }

            match authenticator.authenticate(request.headers()) {
                Ok(auth_context) => {
                    request.extensions_mut().insert(auth_context);
                    inner.call(request).await
                }
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractor
// ═══════════════════════════════════════════════════════════════════════════════

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
