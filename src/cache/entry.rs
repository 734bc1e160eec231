//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::cache::ENTRY_OVERHEAD;

// == Cache Entry ==
/// Represents a single cache entry with payload and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub value: Bytes,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The payload to store
    /// * `ttl_seconds` - TTL in seconds, `0` means the entry never expires
    pub fn new(value: Bytes, ttl_seconds: u64) -> Self {
        Self {
            value,
            expires_at: expiry_from_ttl(ttl_seconds),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the whole seconds left before expiry.
    ///
    /// `0` is returned both for entries without TTL and for entries that
    /// are already past their expiry.
    pub fn ttl_remaining(&self) -> u64 {
        match self.expires_at {
            Some(expires) => expires.saturating_sub(current_timestamp_ms()) / 1000,
            None => 0,
        }
    }

    /// Seconds left before expiry, rounded up, as sent to peers.
    ///
    /// Never `0` for an entry carrying a TTL, so a receiver cannot mistake a
    /// nearly expired value for one that never expires.
    pub fn wire_ttl(&self) -> u64 {
        match self.expires_at {
            Some(expires) => expires
                .saturating_sub(current_timestamp_ms())
                .div_ceil(1000)
                .max(1),
            None => 0,
        }
    }

    // == Charge ==
    /// Number of bytes this entry counts against the cache capacity.
    pub fn charge(&self, key: &str) -> usize {
        entry_charge(key, self.value.len())
    }
}

// == Utility Functions ==
/// Accounting size of a key/payload pair.
pub fn entry_charge(key: &str, value_len: usize) -> usize {
    key.len() + value_len + ENTRY_OVERHEAD
}

/// Converts a TTL in seconds into an absolute expiry, `0` meaning none.
pub fn expiry_from_ttl(ttl_seconds: u64) -> Option<u64> {
    if ttl_seconds == 0 {
        None
    } else {
        Some(current_timestamp_ms().saturating_add(ttl_seconds.saturating_mul(1000)))
    }
}

/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
