//! API Module
//!
//! Inbound side of the peer protocol, served over HTTP by every node.
//!
//! # Endpoints
//! - `GET /_mesh/:group/:key` - Fetch a value owned by this node
//! - `PUT /_mesh/:group/:key` - Store a value on this node
//! - `DELETE /_mesh/:group/:key` - Delete a key on this node
//! - `GET /stats/:group` - Group statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

/// Path prefix of the peer protocol endpoints
pub const BASE_PATH: &str = "/_mesh";

/// Response header carrying the remaining TTL of a fetched value, in seconds
pub const TTL_HEADER: &str = "x-cache-ttl";
