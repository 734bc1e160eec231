//! Cache Group Module
//!
//! A named cache namespace spread over the cluster.
//!
//! # Read path
//! 1. primary cache (values this node owns)
//! 2. hot cache (values fetched from their owners)
//! 3. coalesced load: the owning peer if remote, the retriever otherwise or
//!    when the peer call fails
//!
//! Writes and deletes are delegated to the owner the same way and fall back
//! to the local caches and the write-through sinks.

mod source;
mod table;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CacheStore, HOT_CACHE_DIVISOR};
use crate::coalesce::RequestCoalescer;
use crate::error::{CacheError, Result};
use crate::peers::{PeerPick, Picker};
use crate::server::Server;
use crate::tasks::spawn_expiry_sweep;

pub use source::{
    deleter_fn, retriever_fn, writer_fn, Deleter, DeleterFn, MemorySource, Retriever,
    RetrieverFn, Writer, WriterFn,
};
pub use table::{GroupConfig, GroupRegistry};

// == Group Stats ==
/// Statistics of both cache tiers of a group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub name: String,
    pub main: CacheStats,
    pub hot: CacheStats,
}

// == Cache Group ==
pub struct CacheGroup {
    name: String,
    /// Entries this node owns, filled from the retriever and local writes
    main_cache: Arc<CacheStore>,
    /// Entries owned by other peers
    hot_cache: Arc<CacheStore>,
    picker: Arc<dyn Picker>,
    server: Option<Arc<Server>>,
    flights: RequestCoalescer,
    retriever: Arc<dyn Retriever>,
    writer: Option<Arc<dyn Writer>>,
    deleter: Option<Arc<dyn Deleter>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CacheGroup {
    // == Constructor ==
    /// Creates a group whose primary cache holds `capacity` bytes; the hot
    /// cache gets a tenth of that. A capacity of 0 leaves both unbounded.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        retriever: Arc<dyn Retriever>,
        picker: Arc<dyn Picker>,
    ) -> Self {
        Self {
            name: name.into(),
            main_cache: Arc::new(CacheStore::new(capacity)),
            hot_cache: Arc::new(CacheStore::new(capacity / HOT_CACHE_DIVISOR)),
            picker,
            server: None,
            flights: RequestCoalescer::new(),
            retriever,
            writer: None,
            deleter: None,
            sweeper: Mutex::new(None),
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

    /// Ties `server` to the group: [`CacheGroup::shutdown`] stops it.
    pub fn with_server(mut self, server: Arc<Server>) -> Self {
        self.server = Some(server);
        self
    }

    /// Starts the active-expiration task over both tiers, replacing any
    /// previous one.
    pub fn start_sweeper(&self, interval: Duration) {
        let handle = spawn_expiry_sweep(
            self.name.clone(),
            vec![self.main_cache.clone(), self.hot_cache.clone()],
            interval,
        );
        if let Some(previous) = self.sweeper.lock().replace(handle) {
            previous.abort();
        }
    }

    // == Get ==
    /// Returns the value of `key` and its remaining TTL in seconds (0 = none).
    pub async fn get(&self, key: &str) -> Result<(Bytes, u64)> {
        validate_key(key)?;

        if let Some(hit) = self.main_cache.get(key) {
            debug!(group = %self.name, key, "primary cache hit");
            return Ok(hit);
        }
        if let Some(hit) = self.hot_cache.get(key) {
            debug!(group = %self.name, key, "hot cache hit");
            return Ok(hit);
        }

        self.flights.reads.run(key, || self.load(key)).await
    }

    async fn load(&self, key: &str) -> Result<(Bytes, u64)> {
        if let PeerPick::Remote(peer) = self.picker.pick(key) {
            match peer.fetch(&self.name, key).await {
                Ok((value, ttl)) => {
                    self.hot_cache.add(key, &value, ttl);
                    return Ok((value, ttl));
                }
                Err(e) => {
                    warn!(group = %self.name, key, peer = peer.addr(), "peer fetch failed: {}", e);
                }
            }
        }

        self.load_from_source(key).await
    }

    async fn load_from_source(&self, key: &str) -> Result<(Bytes, u64)> {
        let (value, ttl) = self.retriever.retrieve(key).await?;
        debug!(group = %self.name, key, ttl, "loaded from source");
        self.main_cache.add(key, &value, ttl);
        Ok((value, ttl))
    }

    // == Set ==
    /// Stores `value` under `key`, on the owning peer when there is one.
    pub async fn set(&self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
        self.write(key, value, ttl, false).await
    }

    /// Like [`CacheGroup::set`], but the owner keeps a value it already caches.
    pub async fn set_if_absent(&self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
        self.write(key, value, ttl, true).await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: u64, if_not_exists: bool) -> Result<()> {
        validate_key(key)?;
        let value = Bytes::copy_from_slice(value);

        self.flights
            .writes
            .run(key, || async {
                if let PeerPick::Remote(peer) = self.picker.pick(key) {
                    match peer
                        .store(&self.name, key, value.clone(), ttl, if_not_exists)
                        .await
                    {
                        Ok(()) => {
                            self.hot_cache.delete(key);
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(group = %self.name, key, peer = peer.addr(), "peer store failed: {}", e);
                        }
                    }
                }
                self.store_local(key, &value, ttl, if_not_exists).await
            })
            .await
    }

    // == Del ==
    /// Removes `key`, on the owning peer when there is one.
    pub async fn del(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        self.flights
            .deletes
            .run(key, || async {
                if let PeerPick::Remote(peer) = self.picker.pick(key) {
                    match peer.delete(&self.name, key).await {
                        Ok(()) => {
                            self.hot_cache.delete(key);
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(group = %self.name, key, peer = peer.addr(), "peer delete failed: {}", e);
                        }
                    }
                }
                self.delete_local(key).await
            })
            .await
    }

    // == Owner-side Operations ==
    /// Serves a read as the owner of `key`: primary cache, then the retriever.
    ///
    /// The TTL is rounded up to whole seconds: a value about to expire is
    /// reported with 1, never with 0 (no expiry).
    pub async fn fetch_local(&self, key: &str) -> Result<(Bytes, u64)> {
        validate_key(key)?;

        if let Some(entry) = self.main_cache.get_entry(key) {
            let ttl = entry.wire_ttl();
            return Ok((entry.value, ttl));
        }
        self.flights
            .owner_reads
            .run(key, || self.load_from_source(key))
            .await
    }

    /// Stores as the owner of `key`: primary cache, then the writer.
    pub async fn store_local(
        &self,
        key: &str,
        value: &[u8],
        ttl: u64,
        if_not_exists: bool,
    ) -> Result<()> {
        validate_key(key)?;

        if if_not_exists && self.main_cache.contains(key) {
            debug!(group = %self.name, key, "key present, store skipped");
            return Ok(());
        }

        self.main_cache.add(key, value, ttl);
        self.hot_cache.delete(key);
        if let Some(writer) = &self.writer {
            writer.write(key, value, ttl).await?;
        }
        Ok(())
    }

    /// Deletes as the owner of `key`: both tiers, then the deleter.
    pub async fn delete_local(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        self.main_cache.delete(key);
        self.hot_cache.delete(key);
        if let Some(deleter) = &self.deleter {
            deleter.delete(key).await?;
        }
        Ok(())
    }

    // == Accessors ==
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&self) -> Option<&Arc<Server>> {
        self.server.as_ref()
    }

    pub fn stats(&self) -> GroupStats {
        GroupStats {
            name: self.name.clone(),
            main: self.main_cache.stats(),
            hot: self.hot_cache.stats(),
        }
    }

    // == Shutdown ==
    /// Stops the sweep task and the server. Cached data is left in place.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
        if let Some(server) = &self.server {
            server.stop().await;
        }
        info!(group = %self.name, "cache group shut down");
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("key required".to_string()));
    }
    Ok(())
}
