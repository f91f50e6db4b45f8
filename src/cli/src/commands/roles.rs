//! Role management commands, including permission grants.

use anyhow::{bail, Result};
use clap::Subcommand;
use std::sync::Arc;

use backoffice_client::{AssociationEditController, CommitOutcome, Permission, Role, RolePermissions};

use super::common::{self, controller_error, ensure_success};
use super::Context;
use crate::output;

#[derive(Subcommand)]
pub enum RoleCommands {
    /// List roles
    List,

    /// Show one role
    Get { id: String },

    /// Create a role, optionally granting permissions
    Create {
        #[arg(short, long)]
        name: String,
        /// Permission ID to grant; repeat for several
        #[arg(short, long = "permission")]
        permissions: Vec<String>,
    },

    /// Rename a role and/or replace its permission set
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        /// Exact permission set after the update; repeat for several
        #[arg(short, long = "permission")]
        permissions: Option<Vec<String>>,
    },

    /// Delete a role and its grants
    Delete { id: String },

    /// Archive a role, keeping it for audit
    Archive { id: String },

    /// List the permissions granted to a role
    Permissions { id: String },

    /// Grant permissions to a role
    Grant {
        id: String,
        #[arg(required = true)]
        permission_ids: Vec<String>,
    },

    /// Revoke permissions from a role
    Revoke {
        id: String,
        #[arg(required = true)]
        permission_ids: Vec<String>,
    },
}

pub async fn execute(cmd: RoleCommands, ctx: &Context) -> Result<()> {
    match cmd {
        RoleCommands::List => common::list::<Role>(ctx).await,
        RoleCommands::Get { id } => common::get::<Role>(ctx, &id).await,
        RoleCommands::Create { name, permissions } if permissions.is_empty() => {
            common::create::<Role>(ctx, common::named(Some(name))).await
        }
        RoleCommands::Create { name, permissions } => edit(ctx, None, Some(name), permissions).await,
        RoleCommands::Update {
            id,
            name,
            permissions: Some(permissions),
        } => edit(ctx, Some(&id), name, permissions).await,
        RoleCommands::Update {
            id,
            name,
            permissions: None,
        } => common::update::<Role>(ctx, &id, common::named(name)).await,
        RoleCommands::Delete { id } => common::remove::<Role>(ctx, &id, false).await,
        RoleCommands::Archive { id } => common::remove::<Role>(ctx, &id, true).await,
        RoleCommands::Permissions { id } => {
            let association = RolePermissions::role_permissions(ctx.client.clone());
            let outcome = association.list(&id).await?;
            ensure_success(&outcome.response)?;
            output::print_list(&outcome.data.unwrap_or_default(), ctx.format)
        }
        RoleCommands::Grant { id, permission_ids } => {
            let association = RolePermissions::role_permissions(ctx.client.clone());
            let outcome = association.add(&id, &permission_ids).await?;
            ensure_success(&outcome.response)?;
            output::print_success(&format!("Granted {} permission(s) to {}", permission_ids.len(), id));
            output::print_list(&outcome.data.unwrap_or_default(), ctx.format)
        }
        RoleCommands::Revoke { id, permission_ids } => {
            let association = RolePermissions::role_permissions(ctx.client.clone());
            let outcome = association.remove(&id, &permission_ids).await?;
            ensure_success(&outcome.response)?;
            output::print_success(&format!("Revoked {} permission(s) from {}", permission_ids.len(), id));
            output::print_list(&outcome.data.unwrap_or_default(), ctx.format)
        }
    }
}

/// Save a role with exactly `permissions` granted.
async fn edit(ctx: &Context, id: Option<&str>, name: Option<String>, permissions: Vec<String>) -> Result<()> {
    let controller: AssociationEditController<Role, Permission> = AssociationEditController::new(
        common::cache::<Role>(ctx),
        common::cache::<Permission>(ctx),
        Arc::new(RolePermissions::role_permissions(ctx.client.clone())),
    );

    if !controller.init(id).await? {
        bail!("Could not load the permissions of role {}", id.unwrap_or_default());
    }
    for current in controller.pending.get() {
        controller.remove(&current.id);
    }
    for permission in &permissions {
        if !controller.add(permission) {
            bail!("Unknown or repeated permission {}", permission);
        }
    }

    match controller.commit(id, &common::named(name)).await? {
        CommitOutcome::Saved(role) => common::saved(&role, ctx.format),
        CommitOutcome::Rejected(_) => Err(controller_error(&controller.error)),
    }
}
