//! Backoffice Server - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use backoffice_core::{
    api::{self, AppState},
    config::{Config, StorageBackend},
    db::Database,
    middleware::{AuthConfig, Authenticator},
    observability,
    store::{PgAssociationStore, PgResourceStore, PERMISSIONS, ROLES, ROLE_PERMISSIONS},
    BackofficeError,
};

#[derive(Parser)]
#[command(name = "backoffice-server", version, about = "Backoffice API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Mint a signed access token
    Token {
        /// Subject (user ID)
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: Option<String>,
        /// Granted permission; repeat for several, `*` for all
        #[arg(long = "permission", short = 'p', default_value = "*")]
        permissions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Token {
            user,
            email,
            permissions,
        } => {
            let authenticator = Authenticator::new(AuthConfig::from(&config.auth))?;
            let token = authenticator.issue(&user, email.as_deref(), permissions)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    observability::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.storage.backend,
        auth_enabled = config.auth.enabled,
        "Starting Backoffice Server"
    );

    let authenticator = Arc::new(Authenticator::new(AuthConfig::from(&config.auth))?);
    let metrics = observability::metrics::install_recorder()?;

    let state = match config.storage.backend {
        StorageBackend::Memory => AppState::in_memory(authenticator),
        StorageBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .ok_or_else(|| BackofficeError::configuration("database.url is required for the postgres backend"))?;
            let db = Database::new(url, &config.database).await?;
            tracing::info!("Connected to database");

            if config.database.run_migrations {
                db.migrate().await?;
            }

            let pool = db.pool().clone();
            AppState {
                roles: Arc::new(PgResourceStore::new(pool.clone(), ROLES)),
                permissions: Arc::new(PgResourceStore::new(pool.clone(), PERMISSIONS)),
                role_permissions: Arc::new(PgAssociationStore::new(pool, ROLE_PERMISSIONS)),
                authenticator,
                metrics: None,
                database: Some(db),
            }
        }
    }
    .with_metrics(metrics);

    let app = api::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    observability::shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
