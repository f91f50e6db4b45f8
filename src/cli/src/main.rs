//! Backoffice CLI - manage roles and permissions from the terminal.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use backoffice_client::RemoteResourceClient;
use commands::{config, permissions, roles, Context};
use output::OutputFormat;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Backoffice - role and permission administration
#[derive(Parser)]
#[command(name = "backoffice", version, about = "Backoffice administration CLI", propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "BACKOFFICE_API_URL")]
    api_url: Option<String>,

    /// Access token
    #[arg(long, global = true, env = "BACKOFFICE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Role management
    #[command(subcommand)]
    Roles(roles::RoleCommands),

    /// Permission management
    #[command(subcommand)]
    Permissions(permissions::PermissionCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let format = cli.output;
    let connect = || -> Result<Context> {
        let saved = config::load();
        let api_url = cli
            .api_url
            .clone()
            .or(saved.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let client = RemoteResourceClient::builder(&api_url)
            .maybe_token(cli.token.clone().or(saved.token))
            .on_unauthorized(|login| output::print_login(login))
            .build()?;
        Ok(Context { client, format })
    };

    let result = match cli.command {
        Commands::Config(cmd) => config::execute(cmd, format).await,
        Commands::Roles(cmd) => match connect() {
            Ok(ctx) => roles::execute(cmd, &ctx).await,
            Err(e) => Err(e),
        },
        Commands::Permissions(cmd) => match connect() {
            Ok(ctx) => permissions::execute(cmd, &ctx).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
