//! In-process registry shared by every node of one process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

use super::{Members, Registry};
use crate::error::Result;

/// Registry keeping advertisements in memory.
///
/// Clones share the same membership, so several servers in one process can
/// discover each other through it.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    services: Arc<Mutex<HashMap<String, watch::Sender<Members>>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current members of `service`.
    pub fn members(&self, service: &str) -> Members {
        self.services
            .lock()
            .get(service)
            .map(|tx| tx.borrow().clone())
            .unwrap_or_default()
    }

    fn update<F>(&self, service: &str, change: F)
    where
        F: FnOnce(&mut Members) -> bool,
    {
        let mut services = self.services.lock();
        let tx = services
            .entry(service.to_string())
            .or_insert_with(|| watch::channel(Members::new()).0);
        tx.send_if_modified(change);
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn advertise(&self, service: &str, addr: &str) -> Result<()> {
        info!(service, addr, "advertise");
        self.update(service, |members| members.insert(addr.to_string()));
        Ok(())
    }

    async fn withdraw(&self, service: &str, addr: &str) -> Result<()> {
        info!(service, addr, "withdraw");
        self.update(service, |members| members.remove(addr));
        Ok(())
    }

    async fn watch(&self, service: &str) -> Result<watch::Receiver<Members>> {
        let mut services = self.services.lock();
        let tx = services
            .entry(service.to_string())
            .or_insert_with(|| watch::channel(Members::new()).0);
        Ok(tx.subscribe())
    }
}
