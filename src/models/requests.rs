//! Request DTOs for the peer API
//!
//! Defines the query parameters of incoming store requests.

use serde::Deserialize;

/// Query string of the store operation (`PUT /_mesh/:group/:key`)
///
/// # Fields
/// - `ttl`: TTL in seconds, `0` for no expiry
/// - `nx`: only store when the key is not already cached on the owner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreQuery {
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub nx: bool,
}
