//! Axum router construction.
//!
//! Assembles all routes (REST + SSE) into a single [`Router`] with CORS
//! middleware enabled for cross-origin page access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::stream;

/// Build the complete router.
///
/// - `POST /api/join`
/// - `POST /api/force-start`
/// - `GET /api/state`
/// - `GET /api/lobby`
/// - `GET /events` -- SSE stream
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/join", post(handlers::join))
        .route("/api/force-start", post(handlers::force_start))
        .route("/api/state", get(handlers::get_state))
        .route("/api/lobby", get(handlers::get_lobby))
        .route("/events", get(stream::events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
