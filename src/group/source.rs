//! Source of Truth
//!
//! Capabilities a group calls when no cache tier can answer: a retriever for
//! read-through, a writer for write-through and a deleter for deletes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Capabilities ==
/// Read-through source. Returns the value and its TTL in seconds (0 = none).
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, key: &str) -> Result<(Bytes, u64)>;
}

/// Write-through sink, called after the primary cache is updated.
#[async_trait]
pub trait Writer: Send + Sync {
    async fn write(&self, key: &str, value: &[u8], ttl: u64) -> Result<()>;
}

/// Delete sink, called after a key is dropped from the local caches.
#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(&self, key: &str) -> Result<()>;
}

// == Closure Adapters ==
pub struct RetrieverFn<F>(F);
pub struct WriterFn<F>(F);
pub struct DeleterFn<F>(F);

/// Wraps `|key| async { .. }` as a [`Retriever`].
pub fn retriever_fn<F, Fut>(f: F) -> RetrieverFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(Bytes, u64)>> + Send,
{
    RetrieverFn(f)
}

/// Wraps `|key, value, ttl| async { .. }` as a [`Writer`].
pub fn writer_fn<F, Fut>(f: F) -> WriterFn<F>
where
    F: Fn(String, Bytes, u64) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    WriterFn(f)
}

/// Wraps `|key| async { .. }` as a [`Deleter`].
pub fn deleter_fn<F, Fut>(f: F) -> DeleterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    DeleterFn(f)
}

#[async_trait]
impl<F, Fut> Retriever for RetrieverFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(Bytes, u64)>> + Send,
{
    async fn retrieve(&self, key: &str) -> Result<(Bytes, u64)> {
        (self.0)(key.to_string()).await
    }
}

#[async_trait]
impl<F, Fut> Writer for WriterFn<F>
where
    F: Fn(String, Bytes, u64) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn write(&self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
        (self.0)(key.to_string(), Bytes::copy_from_slice(value), ttl).await
    }
}

#[async_trait]
impl<F, Fut> Deleter for DeleterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn delete(&self, key: &str) -> Result<()> {
        (self.0)(key.to_string()).await
    }
}

// == Memory Source ==
/// In-memory backing store implementing all three capabilities.
///
/// Clones share the same data. Entries may carry a TTL; an expired entry is
/// reported as missing.
#[derive(Clone, Default)]
pub struct MemorySource {
    data: Arc<RwLock<HashMap<String, CacheEntry>>>,
    retrievals: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every retrieval by `latency`, simulating a slow database.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, key: impl Into<String>, value: &[u8], ttl: u64) {
        let entry = CacheEntry::new(Bytes::copy_from_slice(value), ttl);
        self.data.write().insert(key.into(), entry);
    }

    /// Current live value for `key`, bypassing the retrieval counter.
    pub fn value(&self, key: &str) -> Option<Bytes> {
        self.data
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Number of `retrieve` calls served so far.
    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl Retriever for MemorySource {
    async fn retrieve(&self, key: &str) -> Result<(Bytes, u64)> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let data = self.data.read();
        match data.get(key) {
            Some(entry) if !entry.is_expired() => Ok((entry.value.clone(), entry.wire_ttl())),
            _ => Err(CacheError::NotFound(key.to_string())),
        }
    }
}

#[async_trait]
impl Writer for MemorySource {
    async fn write(&self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
        self.insert(key, value, ttl);
        Ok(())
    }
}

#[async_trait]
impl Deleter for MemorySource {
    /// Idempotent: deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }
}
