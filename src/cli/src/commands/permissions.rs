//! Permission management commands.

use anyhow::Result;
use clap::Subcommand;

use backoffice_client::Permission;

use super::common;
use super::Context;

#[derive(Subcommand)]
pub enum PermissionCommands {
    /// List permissions
    List,

    /// Show one permission
    Get { id: String },

    /// Create a permission
    Create {
        #[arg(short, long)]
        name: String,
    },

    /// Rename a permission
    Update {
        id: String,
        #[arg(short, long)]
        name: String,
    },

    /// Delete a permission and its role grants
    Delete { id: String },

    /// Archive a permission, keeping it for audit
    Archive { id: String },
}

pub async fn execute(cmd: PermissionCommands, ctx: &Context) -> Result<()> {
    match cmd {
        PermissionCommands::List => common::list::<Permission>(ctx).await,
        PermissionCommands::Get { id } => common::get::<Permission>(ctx, &id).await,
        PermissionCommands::Create { name } => common::create::<Permission>(ctx, common::named(Some(name))).await,
        PermissionCommands::Update { id, name } => {
            common::update::<Permission>(ctx, &id, common::named(Some(name))).await
        }
        PermissionCommands::Delete { id } => common::remove::<Permission>(ctx, &id, false).await,
        PermissionCommands::Archive { id } => common::remove::<Permission>(ctx, &id, true).await,
    }
}
