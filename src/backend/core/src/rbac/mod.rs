//! Role-based access control for backoffice operations.
//!
//! - **Permission**: the closed catalogue of operation grants (`roles:read`, ...)
//! - **PermissionSet**: what a caller holds, with `*` and `resource:*` wildcards
//!
//! The check itself runs inside the request pipeline, after input validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use backoffice_core::rbac::{Permission, PermissionSet};
//!
//! let held: PermissionSet = ["roles:read", "roles:edit"].into_iter().collect();
//! assert!(held.grants(Permission::EditRoles));
//! ```

pub mod models;

pub use models::{Permission, PermissionSet, UnknownPermission, WILDCARD};
