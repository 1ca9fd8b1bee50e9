//! Route Definitions

use super::{handlers::*, websocket::websocket_handler};
use axum::{routing::get, Router};
use std::sync::Arc;

/// Build the router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(rooms_handler))
        .route("/rooms/:room", get(room_handler))
        .route("/metrics", get(metrics_handler))
        // Game traffic
        .route("/ws", get(websocket_handler))
        .fallback(not_found_handler)
        .with_state(state)
}
