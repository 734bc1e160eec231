//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and byte-bounded LRU eviction.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use lru::ExpiringLruCache;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Fixed per-entry accounting overhead in bytes (expiry timestamp and bookkeeping)
pub const ENTRY_OVERHEAD: usize = 24;

/// The hot cache gets this fraction of the primary cache capacity
pub const HOT_CACHE_DIVISOR: usize = 10;
