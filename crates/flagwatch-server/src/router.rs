//! Axum router construction for the API server.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// - `GET /` -- minimal HTML status page
/// - `GET /api/flags/{series}` -- current flags for a series
/// - `GET /api/events` -- history feed
///
/// CORS is configured to allow any origin, matching the original
/// deployment where the dashboard is served from a separate host.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // REST API
        .route("/api/flags/{series}", get(handlers::get_flags))
        .route("/api/events", get(handlers::get_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
