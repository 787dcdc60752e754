//! File Cache sweeper
//!
//! Opens the configured cache directory and periodically removes expired
//! entries until interrupted. Run one instance per cache directory.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filecache::{spawn_sweep_task, CacheConfig, FileCache};

/// Main entry point for the cache sweeper.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache directory (creating it if needed)
/// 4. Run one sweep immediately, then start the periodic sweep task
/// 5. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filecache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting file cache sweeper");

    // Load configuration from environment variables
    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: root={}, default_ttl={}s, sweep_interval={}s",
        config.root.display(),
        config.default_ttl,
        config.sweep_interval
    );

    let sweep_interval = config.sweep_interval;
    let cache = Arc::new(
        FileCache::new(config).context("failed to open cache directory")?,
    );

    let startup_cache = Arc::clone(&cache);
    let report = tokio::task::spawn_blocking(move || startup_cache.clean_expired())
        .await
        .context("startup sweep failed")?;
    info!(
        "Startup sweep: scanned {} files, removed {}",
        report.scanned, report.removed
    );

    // Start background sweep task
    let sweep_handle = spawn_sweep_task(cache, sweep_interval);
    info!("Background sweep task started");

    shutdown_signal().await?;

    sweep_handle.abort();
    warn!("Sweep task aborted");
    info!("Sweeper shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .context("failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        }
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    Ok(())
}
