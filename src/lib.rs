//! Mesh Cache - An embeddable distributed cache
//!
//! Named cache groups spread over a cluster of peers: keys are owned through a
//! consistent-hash ring, concurrent misses are coalesced, values expire by TTL
//! and are evicted by LRU within a byte budget.

pub mod api;
pub mod cache;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod group;
pub mod models;
pub mod peers;
pub mod registry;
pub mod server;
pub mod tasks;

pub use config::Config;
pub use error::{CacheError, Result};
pub use group::{CacheGroup, GroupConfig, GroupRegistry, MemorySource};
pub use registry::{MemoryRegistry, Registry, StaticRegistry};
pub use server::Server;
