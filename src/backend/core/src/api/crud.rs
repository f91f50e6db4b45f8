//! Generic CRUD routes for named resources.
//!
//! Roles and permissions share the same body shape and endpoint set; each
//! entity only supplies a [`CrudConfig`] with its path, operation names and
//! permission set.

use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{serialize_fields, Create, Delete, Get, List, Update, WriteBody};
use crate::error::Result;
use crate::pipeline::{serve, Pipeline};
use crate::rbac::Permission;
use crate::store::{Fields, ResourceStore};
use crate::validation::{
    trimmed, trimmed_option, validate_field, validate_request, MaxLength, Required, Validate,
    ValidationResult,
};

/// Longest accepted resource name.
pub const NAME_MAX: usize = 255;

/// Body of `POST /{resource}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameBody {
    #[serde(deserialize_with = "trimmed")]
    pub name: String,
}

impl Validate for NameBody {
    fn validate(&self) -> ValidationResult<()> {
        validate_request()
            .field(validate_field("name", &self.name).rule(Required).rule(MaxLength(NAME_MAX)))
            .result()
    }
}

impl WriteBody for NameBody {
    fn into_fields(self) -> Result<Fields> {
        serialize_fields(&self)
    }
}

/// Body of `PATCH /{resource}/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamePatch {
    #[serde(default, deserialize_with = "trimmed_option")]
    pub name: Option<String>,
}

impl Validate for NamePatch {
    fn validate(&self) -> ValidationResult<()> {
        validate_request()
            .field(validate_field("name", &self.name).rule(Required).rule(MaxLength(NAME_MAX)))
            .result()
    }
}

impl WriteBody for NamePatch {
    fn into_fields(self) -> Result<Fields> {
        serialize_fields(&self)
    }
}

/// Operation names used in spans and metrics.
#[derive(Debug, Clone, Copy)]
pub struct OperationNames {
    pub list: &'static str,
    pub get: &'static str,
    pub create: &'static str,
    pub update: &'static str,
    pub delete: &'static str,
    pub archive: &'static str,
}

/// Permission required per kind of access.
#[derive(Debug, Clone, Copy)]
pub struct CrudPermissions {
    pub read: Permission,
    pub add: Permission,
    pub edit: Permission,
    /// Covers both hard delete and archive
    pub delete: Permission,
}

/// Everything that differs between two CRUD resources.
#[derive(Debug, Clone, Copy)]
pub struct CrudConfig {
    /// Collection path, e.g. `/roles`
    pub path: &'static str,
    pub operations: OperationNames,
    pub permissions: CrudPermissions,
}

/// List, get, create, update, delete and archive routes for one resource.
pub fn router<S>(config: &CrudConfig, store: Arc<dyn ResourceStore>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let ops = config.operations;
    let perms = config.permissions;

    let list = Pipeline::new(ops.list, List::new(store.clone())).require(perms.read);
    let get_one = Pipeline::new(ops.get, Get::new(store.clone())).require(perms.read);
    let create = Pipeline::new(ops.create, Create::<NameBody>::new(store.clone())).require(perms.add);
    let update = Pipeline::new(ops.update, Update::<NamePatch>::new(store.clone())).require(perms.edit);
    let destroy = Pipeline::new(ops.delete, Delete::hard(store.clone())).require(perms.delete);
    let archive = Pipeline::new(ops.archive, Delete::archive(store)).require(perms.delete);

    let item = format!("{}/:id", config.path);
    Router::new()
        .route(config.path, get(serve(list)).post(serve(create)))
        .route(
            &item,
            get(serve(get_one)).patch(serve(update)).delete(serve(destroy)),
        )
        .route(&format!("{}/archive", item), post(serve(archive)))
}
