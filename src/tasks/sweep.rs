//! Expiry Sweep Task
//!
//! Background task that periodically reclaims expired entries a group's
//! readers have not touched.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Pause between two sweep passes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns the active-expiration task of one group.
///
/// Every `interval` each cache in `caches` samples its TTL keys and drops the
/// expired ones. The task runs until its handle is aborted.
pub fn spawn_expiry_sweep(
    group: String,
    caches: Vec<Arc<CacheStore>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(group = %group, "starting expiry sweep every {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed: usize = caches.iter().map(|cache| cache.sweep_expired()).sum();

            if removed > 0 {
                info!(group = %group, "expiry sweep: removed {} entries", removed);
            } else {
                debug!(group = %group, "expiry sweep: nothing expired");
            }
        }
    })
}
