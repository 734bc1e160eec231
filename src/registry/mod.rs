//! Registry Module
//!
//! Service-registry collaborator used by servers to publish their address and
//! learn the current cluster membership.
//!
//! The server only relies on three capabilities: advertise, withdraw and
//! watch. Each watch update carries the full member set.

mod fixed;
mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

pub use fixed::StaticRegistry;
pub use memory::MemoryRegistry;

/// Service name under which cache nodes advertise themselves
pub const SERVICE_NAME: &str = "mesh_cache";

/// Snapshot of the addresses currently advertised under a service name.
pub type Members = BTreeSet<String>;

// == Registry ==
#[async_trait]
pub trait Registry: Send + Sync {
    /// Publishes `addr` under `service`.
    async fn advertise(&self, service: &str, addr: &str) -> Result<()>;

    /// Removes a previous advertisement.
    async fn withdraw(&self, service: &str, addr: &str) -> Result<()>;

    /// Subscribes to membership changes of `service`.
    ///
    /// The receiver holds the current member set and is notified whenever
    /// it changes.
    async fn watch(&self, service: &str) -> Result<watch::Receiver<Members>>;
}
