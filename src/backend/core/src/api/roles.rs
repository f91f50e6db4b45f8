//! `/roles` endpoints, including the role's permission membership.

use axum::{routing::get, Router};
use std::sync::Arc;

use super::crud::{self, CrudConfig, CrudPermissions, OperationNames};
use super::handlers::{AddMembers, ListMembers, RemoveMembers};
use crate::pipeline::{serve, Pipeline};
use crate::rbac::Permission;
use crate::store::{AssociationStore, ResourceStore};

pub const ROLES_CRUD: CrudConfig = CrudConfig {
    path: "/roles",
    operations: OperationNames {
        list: "roles.list",
        get: "roles.get",
        create: "roles.create",
        update: "roles.update",
        delete: "roles.delete",
        archive: "roles.archive",
    },
    permissions: CrudPermissions {
        read: Permission::ReadRoles,
        add: Permission::AddRoles,
        edit: Permission::EditRoles,
        delete: Permission::DeleteRoles,
    },
};

/// Routes for roles and their permissions.
pub fn router<S>(roles: Arc<dyn ResourceStore>, members: Arc<dyn AssociationStore>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let list_members = Pipeline::new("roles.permissions.list", ListMembers::new(members.clone()))
        .require(Permission::ReadRoles);
    let add_members = Pipeline::new("roles.permissions.add", AddMembers::new(members.clone()))
        .require(Permission::EditRoles);
    let remove_members = Pipeline::new("roles.permissions.remove", RemoveMembers::new(members))
        .require(Permission::EditRoles);

    crud::router(&ROLES_CRUD, roles).route(
        "/roles/:id/permissions",
        get(serve(list_members))
            .put(serve(add_members))
            .delete(serve(remove_members)),
    )
}
