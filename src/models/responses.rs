//! Response DTOs for the peer API
//!
//! Defines the structure of outgoing JSON response bodies.

use serde::{Deserialize, Serialize};

use crate::group::GroupStats;

/// Acknowledgement for store and delete operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    /// Success message
    pub message: String,
    /// Group the key belongs to
    pub group: String,
    /// The key that was written or deleted
    pub key: String,
}

impl AckResponse {
    pub fn stored(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new("stored", group.into(), key.into())
    }

    pub fn deleted(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new("deleted", group.into(), key.into())
    }

    fn new(action: &str, group: String, key: String) -> Self {
        Self {
            message: format!("Key '{}' {} in group '{}'", key, action, group),
            group,
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats/:group)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Address of the answering node
    pub node: String,
    /// Current members of the hash ring
    pub peers: Vec<String>,
    #[serde(flatten)]
    pub group: GroupStats,
}

impl StatsResponse {
    pub fn new(node: impl Into<String>, peers: Vec<String>, group: GroupStats) -> Self {
        Self {
            node: node.into(),
            peers,
            group,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Address of the answering node
    pub node: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(node: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            node: node.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error body for all error conditions, also parsed by the peer client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}
