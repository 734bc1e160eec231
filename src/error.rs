//! Error types for the distributed cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for caches, peers and groups.
///
/// Errors are `Clone` because a coalesced operation hands the same outcome
/// to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key not found in any cache, peer or source of truth
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data (empty key, bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Peer or node address not in `host:port` form
    #[error("Invalid address {0}, it should be host:port")]
    InvalidAddress(String),

    /// No group registered under this name
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// A group with this name is already open
    #[error("Group already exists: {0}")]
    GroupExists(String),

    /// Peer unreachable or the call timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote peer answered with an application error
    #[error("Remote error: {0}")]
    Remote(String),

    /// Retriever, writer or deleter failure
    #[error("Source error: {0}")]
    Source(String),

    /// Listener could not be bound
    #[error("Failed to bind {0}")]
    Bind(String),

    /// Server started twice
    #[error("Server already running at {0}")]
    AlreadyRunning(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) | CacheError::GroupNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidAddress(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::GroupExists(_) | CacheError::AlreadyRunning(_) => StatusCode::CONFLICT,
            CacheError::Transport(_) | CacheError::Remote(_) => StatusCode::BAD_GATEWAY,
            CacheError::Source(_) | CacheError::Bind(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
