//! Request and Response models for the peer API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP query strings and JSON response bodies.
//! Cache payloads themselves travel as raw request/response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::StoreQuery;
pub use responses::{AckResponse, ErrorResponse, HealthResponse, StatsResponse};
