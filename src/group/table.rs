//! Group Table
//!
//! Named groups hosted by this process. Passed explicitly to whoever needs to
//! open, look up or destroy groups, including the peer API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{CacheError, Result};
use crate::group::{CacheGroup, Deleter, Retriever, Writer};
use crate::peers::DEFAULT_PEER_TIMEOUT;
use crate::registry::Registry;
use crate::server::Server;
use crate::tasks::DEFAULT_SWEEP_INTERVAL;

// == Group Config ==
/// Everything needed to open a group and its server.
pub struct GroupConfig {
    pub name: String,
    /// Address the group's server listens on and advertises, `host:port`
    pub addr: String,
    /// Primary cache bound in bytes, 0 = unbounded
    pub capacity: usize,
    pub retriever: Arc<dyn Retriever>,
    pub writer: Option<Arc<dyn Writer>>,
    pub deleter: Option<Arc<dyn Deleter>>,
    pub registry: Arc<dyn Registry>,
    pub sweep_interval: Duration,
    pub peer_timeout: Duration,
}

impl GroupConfig {
    pub fn new(
        name: impl Into<String>,
        addr: impl Into<String>,
        capacity: usize,
        retriever: Arc<dyn Retriever>,
        registry: Arc<dyn Registry>,
    ) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            capacity,
            retriever,
            writer: None,
            deleter: None,
            registry,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn Writer>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_deleter(mut self, deleter: Arc<dyn Deleter>) -> Self {
        self.deleter = Some(deleter);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }
}

// == Group Registry ==
/// Name to group table. Clones share the same table.
#[derive(Clone, Default)]
pub struct GroupRegistry {
    groups: Arc<RwLock<HashMap<String, Arc<CacheGroup>>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an already built group. Fails with `GroupExists` on a taken name.
    pub fn insert(&self, group: Arc<CacheGroup>) -> Result<()> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(CacheError::GroupExists(group.name().to_string()));
        }
        groups.insert(group.name().to_string(), group);
        Ok(())
    }

    // == Open ==
    /// Creates a group, starts its server and its expiry sweep.
    ///
    /// Nothing is left in the table when the server fails to start.
    pub async fn open(&self, config: GroupConfig) -> Result<Arc<CacheGroup>> {
        let server = Server::new(config.addr, config.registry, config.peer_timeout)?;

        let mut group = CacheGroup::new(
            config.name,
            config.capacity,
            config.retriever,
            server.clone(),
        )
        .with_server(server.clone());
        if let Some(writer) = config.writer {
            group = group.with_writer(writer);
        }
        if let Some(deleter) = config.deleter {
            group = group.with_deleter(deleter);
        }

        let group = Arc::new(group);
        self.insert(group.clone())?;

        if let Err(e) = server.start(self.clone()).await {
            self.groups.write().remove(group.name());
            return Err(e);
        }
        group.start_sweeper(config.sweep_interval);

        info!(group = %group.name(), addr = %server.addr(), "cache group opened");
        Ok(group)
    }

    // == Get ==
    pub fn get(&self, name: &str) -> Result<Arc<CacheGroup>> {
        self.groups
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::GroupNotFound(name.to_string()))
    }

    // == Destroy ==
    /// Removes the group and stops its server and sweep task.
    pub async fn destroy(&self, name: &str) -> Result<()> {
        let group = self
            .groups
            .write()
            .remove(name)
            .ok_or_else(|| CacheError::GroupNotFound(name.to_string()))?;

        group.shutdown().await;
        info!(group = %name, "cache group destroyed");
        Ok(())
    }

    /// Names of the hosted groups, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Destroys every group.
    pub async fn shutdown_all(&self) {
        let groups: Vec<Arc<CacheGroup>> = self.groups.write().drain().map(|(_, g)| g).collect();

        for group in groups {
            group.shutdown().await;
        }
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}
