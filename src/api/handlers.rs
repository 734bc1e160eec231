//! API Handlers
//!
//! HTTP request handlers for the peer protocol endpoints.
//!
//! Inbound calls are served as the owner of the key: they never delegate to
//! another peer, so two nodes with momentarily different rings cannot bounce
//! a request back and forth.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use tracing::debug;

use crate::api::TTL_HEADER;
use crate::error::Result;
use crate::group::GroupRegistry;
use crate::models::{AckResponse, HealthResponse, StatsResponse, StoreQuery};
use crate::server::Server;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Groups hosted by this process
    pub groups: GroupRegistry,
    /// The server answering, for its address and ring membership
    pub server: Arc<Server>,
}

impl ApiState {
    pub fn new(groups: GroupRegistry, server: Arc<Server>) -> Self {
        Self { groups, server }
    }
}

/// Handler for GET /_mesh/:group/:key
///
/// Returns the raw value as the body and its remaining TTL in a header.
pub async fn fetch_handler(
    State(state): State<ApiState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    debug!(node = %state.server.addr(), group, key, "recv fetch");

    let group = state.groups.get(&group)?;
    let (value, ttl) = group.fetch_local(&key).await?;

    Ok(([(TTL_HEADER, ttl.to_string())], value))
}

/// Handler for PUT /_mesh/:group/:key?ttl=&nx=
pub async fn store_handler(
    State(state): State<ApiState>,
    Path((group, key)): Path<(String, String)>,
    Query(query): Query<StoreQuery>,
    body: Bytes,
) -> Result<Json<AckResponse>> {
    debug!(node = %state.server.addr(), group, key, ttl = query.ttl, "recv store");

    let cache_group = state.groups.get(&group)?;
    cache_group
        .store_local(&key, &body, query.ttl, query.nx)
        .await?;

    Ok(Json(AckResponse::stored(group, key)))
}

/// Handler for DELETE /_mesh/:group/:key
pub async fn delete_handler(
    State(state): State<ApiState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Json<AckResponse>> {
    debug!(node = %state.server.addr(), group, key, "recv delete");

    let cache_group = state.groups.get(&group)?;
    cache_group.delete_local(&key).await?;

    Ok(Json(AckResponse::deleted(group, key)))
}

/// Handler for GET /stats/:group
pub async fn stats_handler(
    State(state): State<ApiState>,
    Path(group): Path<String>,
) -> Result<Json<StatsResponse>> {
    let group = state.groups.get(&group)?;

    Ok(Json(StatsResponse::new(
        state.server.addr(),
        state.server.peers(),
        group.stats(),
    )))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.server.addr()))
}
