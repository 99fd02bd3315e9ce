mod api;
mod catalog;
mod config;
mod prober;
mod scheduler;
mod state_manager;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use shared::protocol::PORT_ENV;
use crate::config::Config;
use crate::prober::Prober;
use crate::scheduler::Scheduler;
use crate::state_manager::StateHandle;

const CATALOG_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mirrorgated=info"))
        )
        .init();

    tracing::info!("Starting mirrorgated");

    // Load config, defaults when no file is given
    let mut config = match std::env::args().nth(1) {
        Some(config_path) => {
            let config = Config::load(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?;
            tracing::info!("Loaded config from {}", config_path);
            config
        }
        None => Config::default(),
    };
    config.apply_port_override(std::env::var(PORT_ENV).ok())?;
    config.validate().context("Invalid configuration")?;

    let catalog_client = reqwest::Client::builder()
        .timeout(CATALOG_FETCH_TIMEOUT)
        .build()
        .context("Failed to create catalog HTTP client")?;

    // First load has nothing to fall back on, so it must succeed
    let initial_catalog = catalog::loader::load(&catalog_client, &config.catalog.source)
        .await
        .with_context(|| format!("Failed initial catalog load from {}", config.catalog.source))?;
    tracing::info!(
        "Loaded {} services from {} (hash {})",
        initial_catalog.len(),
        config.catalog.source,
        initial_catalog.hash()
    );

    if initial_catalog.is_empty() {
        tracing::warn!("Catalog contains no services, every request will get the status page");
    }

    let (catalog_tx, catalog_rx) = watch::channel(Arc::new(initial_catalog));

    // Start state task
    let state = StateHandle::spawn();

    let prober = Prober::new(&config.probe)?;

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn scheduler task, first probe cycle starts immediately
    let scheduler = Scheduler::new(
        config.catalog.source.clone(),
        config.catalog.refresh_interval(),
        catalog_client,
        prober,
        state.clone(),
        catalog_tx,
    );
    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_cancel).await {
            tracing::error!("Scheduler error: {}", e);
        }
    });

    // Build API router
    let app = api::routes::router(api::routes::AppState {
        state: state.clone(),
        catalog_rx,
    });

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("Listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();

    let _ = tokio::join!(scheduler_handle, server_handle);

    if let Err(e) = state.shutdown().await {
        tracing::error!("Failed to shutdown state task: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
