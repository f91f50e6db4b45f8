#![allow(clippy::result_large_err)]
//! # Backoffice Core
//!
//! Administrative backoffice server: uniform CRUD over roles and permissions.
//!
//! ## Architecture
//!
//! - **Pipeline**: validate, authorize, then dispatch every request the same way
//! - **Store**: resource and association storage contracts, with memory and Postgres backends
//! - **API**: canonical list/get/create/update/delete/archive handlers and the role-permission association
//! - **Middleware**: JWT authentication from bearer headers or the session cookie
//! - **RBAC**: the permission catalogue and wildcard grants
//! - **Validation**: request validation with field-level errors
//! - **Observability**: structured logging, OpenTelemetry tracing and Prometheus metrics

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod rbac;
pub mod store;
pub mod validation;

pub use error::{BackofficeError, ErrorCode, ErrorDetails, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, AppState};
    pub use crate::config::Config;
    pub use crate::error::{BackofficeError, ErrorCode, RecoverConstraint, Result};
    pub use crate::middleware::{AuthConfig, AuthContext, AuthLayer, Authenticator, Claims};
    pub use crate::pipeline::{serve, Handler, Input, Pipeline, RawRequest, Reply, Unchecked};
    pub use crate::rbac::{Permission, PermissionSet};
    pub use crate::store::{
        AssociationStore, Deletion, Fields, MemoryDatabase, Record, RecordPage, ResourceStore,
        StoreError,
    };
    pub use crate::validation::{
        validate_field, validate_request, MaxLength, MinItems, Required, UniqueItems, Uuid,
        Validate, ValidationErrors, ValidationResult,
    };
}
