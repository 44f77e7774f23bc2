//! Armory server binary.
//!
//! Loads configuration, builds the execution coordinator, and serves the
//! HTTP API until a shutdown signal arrives. In-flight tool runs get to
//! finish; their children are killed if the process is torn down first.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use armory_core::{load_config, Coordinator};

mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("failed to load configuration")?;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    info!("Armory tool execution server starting...");

    let coordinator = Arc::new(Coordinator::new(&config));
    info!(
        "{} tools registered, {} concurrent executions max",
        coordinator.registry().tool_count(),
        coordinator.max_concurrent()
    );

    let app = routes::router(coordinator);
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
