//! API Routes
//!
//! Configures the Axum router with all peer protocol endpoints.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{
    delete_handler, fetch_handler, health_handler, stats_handler, store_handler, ApiState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET|PUT|DELETE /_mesh/:group/:key` - Peer fetch, store and delete
/// - `GET /stats/:group` - Group statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/_mesh/:group/:key",
            get(fetch_handler).put(store_handler).delete(delete_handler),
        )
        .route("/stats/:group", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
