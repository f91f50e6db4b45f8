//! # Backoffice Client
//!
//! Client-side state for the backoffice API.
//!
//! - [`RemoteResourceClient`]: credential-bearing HTTP calls with a login redirect hook on 401
//! - [`FieldMapping`]: allow-list translation between wire and local field names
//! - [`ResourceCache`]: per-resource status cells for loading, saving and deleting
//! - [`AssociationClient`] and [`AssociationCache`]: role-permission membership with invalidate-on-write
//! - [`controllers`]: list, form and membership editing workflows

pub mod association;
pub mod cache;
pub mod cell;
pub mod controllers;
pub mod error;
pub mod guard;
pub mod mapping;
pub mod remote;
pub mod resources;

pub use association::{AssociationCache, AssociationClient, RolePermissions};
pub use cache::{Outcome, RecordList, ResourceCache};
pub use cell::StatusCell;
pub use controllers::{AssociationEditController, CommitOutcome, FormSyncController, ResourceListController};
pub use error::{ClientError, Result};
pub use guard::{InFlightGuard, Turn};
pub use mapping::{FieldMapping, Fields};
pub use remote::{ApiResponse, RemoteResourceClient};
pub use resources::{Permission, Resource, Role};
