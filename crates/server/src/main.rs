// crates/server/src/main.rs
//! Backup manager server binary.
//!
//! Reads configuration from the environment, prepares the local backup store
//! and serves the HTTP API until the process is stopped.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use backup_manager_server::{create_app, init_metrics, AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,backup_manager_server=info,backup_manager_core=info";

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    init_metrics();

    let config = ServerConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    tokio::fs::create_dir_all(&config.store_dir)
        .await
        .with_context(|| format!("creating backup store at {}", config.store_dir.display()))?;

    let state = AppState::from_config(&config)?;
    let app = create_app(state);

    let addr = SocketAddr::new(config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    eprintln!(
        "\n  backup-manager v{} listening on http://{}\n  store: {}\n",
        env!("CARGO_PKG_VERSION"),
        addr,
        config.store_dir.display()
    );
    tracing::info!(%addr, store = %config.store_dir.display(), "Server ready");

    axum::serve(listener, app).await?;

    Ok(())
}
