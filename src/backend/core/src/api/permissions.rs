//! `/permissions` endpoints.

use axum::Router;
use std::sync::Arc;

use super::crud::{self, CrudConfig, CrudPermissions, OperationNames};
use crate::rbac::Permission;
use crate::store::ResourceStore;

pub const PERMISSIONS_CRUD: CrudConfig = CrudConfig {
    path: "/permissions",
    operations: OperationNames {
        list: "permissions.list",
        get: "permissions.get",
        create: "permissions.create",
        update: "permissions.update",
        delete: "permissions.delete",
        archive: "permissions.archive",
    },
    permissions: CrudPermissions {
        read: Permission::ReadPermissions,
        add: Permission::AddPermissions,
        edit: Permission::EditPermissions,
        delete: Permission::DeletePermissions,
    },
};

pub fn router<S>(permissions: Arc<dyn ResourceStore>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    crud::router(&PERMISSIONS_CRUD, permissions)
}
