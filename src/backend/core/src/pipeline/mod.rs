//! Uniform request pipeline: validate, authorize, dispatch.
//!
//! Every backoffice endpoint is a [`Pipeline`] wrapping a [`Handler`]. The
//! pipeline owns the parts every endpoint shares:
//!
//! 1. Each input region (path, query, body) is decoded into the handler's
//!    schema type and validated. Any failure is a 400 and the handler never
//!    runs.
//! 2. If a permission is required, the caller must hold it. A missing caller
//!    is a 401, a caller without the grant a 403. The handler never runs.
//! 3. The handler receives typed inputs and returns a status and a body.
//! 4. Handler errors that map to a 5xx are logged in full and replaced with a
//!    generic message before they leave the process.
//!
//! # Example
//!
//! ```rust,ignore
//! let list = Pipeline::new("roles.list", List::new(store)).require(Permission::ReadRoles);
//! let app = Router::new().route("/roles", get(serve(list)));
//! ```

pub mod request;

pub use request::{OneOrMany, RawBody, RawRequest, Region, Schema, Unchecked, MAX_BODY_BYTES};

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::error::{BackofficeError, Result};
use crate::middleware::AuthContext;
use crate::observability::metrics;
use crate::rbac::Permission;
use crate::validation::ValidationErrors;

// ═══════════════════════════════════════════════════════════════════════════════
// Handler Contract
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated, typed handler input.
#[derive(Debug)]
pub struct Input<P, Q, B> {
    pub path: P,
    pub query: Q,
    pub body: B,
    pub caller: AuthContext,
}

/// What a handler answers with.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn new(status: StatusCode, body: &impl Serialize) -> Result<Self> {
        Ok(Self {
            status,
            body: serde_json::to_value(body)?,
        })
    }

    /// 200 with the given body.
    pub fn ok(body: &impl Serialize) -> Result<Self> {
        Self::new(StatusCode::OK, body)
    }

    /// 201 with the given body.
    pub fn created(body: &impl Serialize) -> Result<Self> {
        Self::new(StatusCode::CREATED, body)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// The operation-specific part of an endpoint.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Path: Schema;
    type Query: Schema;
    type Body: Schema;

    async fn handle(&self, input: Input<Self::Path, Self::Query, Self::Body>) -> Result<Reply>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════════════════════

/// A handler plus its authorization requirement.
pub struct Pipeline<H> {
    operation: &'static str,
    required_permission: Option<Permission>,
    handler: H,
}

impl<H: Handler> Pipeline<H> {
    /// `operation` names the endpoint in spans and metrics, e.g. `"roles.list"`.
    pub fn new(operation: &'static str, handler: H) -> Self {
        Self {
            operation,
            required_permission: None,
            handler,
        }
    }

    pub fn require(mut self, permission: Permission) -> Self {
        self.required_permission = Some(permission);
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn required_permission(&self) -> Option<Permission> {
        self.required_permission
    }

    /// Run one request through validation, authorization and the handler.
    pub async fn dispatch(&self, request: RawRequest) -> Response {
        let started = Instant::now();
        let span = info_span!(
            "pipeline",
            operation = self.operation,
            request_id = request.caller.as_ref().map(|c| c.request_id.as_str()).unwrap_or_default(),
        );

        let response = async {
            match self.run(request).await {
                Ok(reply) => reply.into_response(),
                Err(e) if e.is_server_error() => e.redacted().into_response(),
                Err(e) => e.into_response(),
            }
        }
        .instrument(span)
        .await;

        metrics::record_request(
            self.operation,
            response.status().as_u16(),
            started.elapsed().as_secs_f64(),
        );
        response
    }

    async fn run(&self, request: RawRequest) -> Result<Reply> {
        let (path, query, body) = decode_all::<H>(&request)?;

        let caller = self.authorize(request.caller)?;

        self.handler
            .handle(Input {
                path,
                query,
                body,
                caller,
            })
            .await
    }

    fn authorize(&self, caller: Option<AuthContext>) -> Result<AuthContext> {
        let Some(permission) = self.required_permission else {
            return Ok(caller.unwrap_or_else(|| AuthContext::anonymous(Uuid::new_v4().to_string())));
        };

        let caller = caller.ok_or_else(|| BackofficeError::unauthorized("Authentication required"))?;
        if !caller.has_permission(permission) {
            return Err(BackofficeError::forbidden("Not allowed")
                .with_context("required_permission", permission.as_str()));
        }
        Ok(caller)
    }
}

/// Decode every region, collecting errors from all of them.
fn decode_all<H: Handler>(request: &RawRequest) -> Result<(H::Path, H::Query, H::Body)> {
    let path = request.decode::<H::Path>(Region::PathParameters);
    let query = request.decode::<H::Query>(Region::QueryStringParameters);
    let body = request.decode::<H::Body>(Region::Body);

    match (path, query, body) {
        (Ok(path), Ok(query), Ok(body)) => Ok((path, query, body)),
        (path, query, body) => {
            let mut errors = ValidationErrors::new();
            for failed in [path.err(), query.err(), body.err()].into_iter().flatten() {
                errors.merge(failed);
            }
            Err(errors.into())
        }
    }
}

/// Adapt a pipeline into an axum handler.
pub fn serve<H: Handler>(pipeline: Pipeline<H>) -> impl Fn(RawRequest) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    let pipeline = Arc::new(pipeline);
    move |request: RawRequest| {
        let pipeline = pipeline.clone();
        async move { pipeline.dispatch(request).await }.boxed()
    }
}
