//! HTTP API for the backoffice server.
//!
//! # Routes
//!
//! - `GET /health`, `GET /metrics` (public)
//! - `GET|POST /roles`, `GET|PATCH|DELETE /roles/:id`, `POST /roles/:id/archive`
//! - `GET|PUT|DELETE /roles/:id/permissions`
//! - `GET|POST /permissions`, `GET|PATCH|DELETE /permissions/:id`,
//!   `POST /permissions/:id/archive`
//!
//! Every resource route is a [`Pipeline`](crate::pipeline::Pipeline), so
//! validation, authorization and error redaction behave the same everywhere.

pub mod crud;
pub mod handlers;
pub mod permissions;
pub mod roles;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
use crate::middleware::{AuthLayer, Authenticator};
use crate::store::{AssociationStore, MemoryDatabase, ResourceStore, PERMISSIONS, ROLES, ROLE_PERMISSIONS};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub roles: Arc<dyn ResourceStore>,
    pub permissions: Arc<dyn ResourceStore>,
    pub role_permissions: Arc<dyn AssociationStore>,
    pub authenticator: Arc<Authenticator>,
    /// Present when the Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Present for the Postgres backend
    pub database: Option<Database>,
}

impl AppState {
    /// State over a fresh in-memory database.
    pub fn in_memory(authenticator: Arc<Authenticator>) -> Self {
        let db = MemoryDatabase::new();
        Self {
            roles: Arc::new(db.resource(ROLES)),
            permissions: Arc::new(db.resource(PERMISSIONS)),
            role_permissions: Arc::new(db.association(ROLE_PERMISSIONS)),
            authenticator,
            metrics: None,
            database: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Build the API router.
///
/// ```rust,ignore
/// let app = build_router(AppState::in_memory(authenticator));
/// axum::serve(listener, app).await?;
/// ```
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .merge(roles::router(state.roles.clone(), state.role_permissions.clone()))
        .merge(permissions::router(state.permissions.clone()))
        .layer(AuthLayer::new(state.authenticator.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health and Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, storage) = match &state.database {
        None => (StatusCode::OK, "memory"),
        Some(db) => match db.ping().await {
            Ok(()) => (StatusCode::OK, "postgres"),
            Err(e) => {
                tracing::warn!(error = %e, "Health check could not reach the database");
                (StatusCode::SERVICE_UNAVAILABLE, "postgres")
            }
        },
    };

    let label = if status.is_success() { "ok" } else { "unavailable" };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "storage": storage,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}
