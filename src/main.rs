//! Mesh Cache node
//!
//! Runs one cluster node serving a single group backed by an in-memory
//! source of truth seeded with sample scores.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mesh_cache::{Config, GroupConfig, GroupRegistry, MemorySource, StaticRegistry};

/// Main entry point for a cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Seed the source of truth
/// 4. Open the group: bind the peer API, join the cluster, start the sweep
/// 5. Destroy every group on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mesh_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mesh Cache node");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: node={}, peers={:?}, group={}, cache_bytes={}",
        config.node_addr, config.peers, config.group_name, config.cache_bytes
    );

    let source = MemorySource::new();
    for (key, value) in [("Tom", "630"), ("Sam", "567"), ("YKH", "999"), ("Jack", "589")] {
        source.insert(key, value.as_bytes(), 0);
    }

    let registry = Arc::new(StaticRegistry::new(config.members()));
    let groups = GroupRegistry::new();
    let group_config = GroupConfig::new(
        config.group_name.clone(),
        config.node_addr.clone(),
        config.cache_bytes,
        Arc::new(source.clone()),
        registry,
    )
    .with_writer(Arc::new(source.clone()))
    .with_deleter(Arc::new(source))
    .with_sweep_interval(config.sweep_interval())
    .with_peer_timeout(config.peer_timeout());

    groups
        .open(group_config)
        .await
        .with_context(|| format!("failed to open group {}", config.group_name))?;
    info!("Node listening on http://{}", config.node_addr);

    shutdown_signal().await?;

    groups.shutdown_all().await;
    info!("Node shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
