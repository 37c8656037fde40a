//! huddle-importer - import orchestration service
//!
//! Drives chat-export imports through upload, preparation, operator
//! selection and conversion, persisting progress on the import record and
//! streaming it to clients over SSE.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_common::config::{RootFolderInitializer, RootFolderResolver};
use huddle_common::events::EventBus;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use huddle_importer::config::{default_log_filter, load_bootstrap_config, resolve_port};
use huddle_importer::AppState;

/// Command-line arguments for huddle-importer
#[derive(Parser, Debug)]
#[command(name = "huddle-importer")]
#[command(about = "Import orchestration service for Huddle")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "HUDDLE_IMPORTER_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_bootstrap_config(args.config.as_deref())
        .context("Failed to load bootstrap config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&toml_config).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting huddle-importer v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new("huddle-importer")
        .with_cli_arg(args.root_folder)
        .with_config_path(args.config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = huddle_importer::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);
    let state = AppState::new(db_pool, event_bus);
    info!("Importers: {}", state.registry.keys().join(", "));

    let app = huddle_importer::build_router(state);

    let port = resolve_port(args.port, &toml_config);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
