//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache files.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::FileCache;

/// Spawns a background task that periodically sweeps expired cache files.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. Each sweep walks the directory tree on the blocking
/// thread pool so it never stalls the async runtime.
///
/// # Arguments
/// * `cache` - Shared reference to the file cache
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(FileCache::new(CacheConfig::from_env())?);
/// let sweep_handle = spawn_sweep_task(cache.clone(), 3600);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<FileCache>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            let sweep_cache = Arc::clone(&cache);
            let report = match tokio::task::spawn_blocking(move || sweep_cache.clean_expired()).await {
                Ok(report) => report,
                Err(e) => {
                    warn!("Expiry sweep panicked or was cancelled: {}", e);
                    continue;
                }
            };

            // Log sweep statistics
            if report.removed > 0 || report.failed > 0 {
                info!(
                    "Expiry sweep: removed {} files, {} failures",
                    report.removed, report.failed
                );
            } else {
                debug!("Expiry sweep: no expired files found");
            }
        }
    })
}
