//! HTTP request handlers

use super::{errors::ApiError, middleware::RequestId, router::EventRouter};
use crate::games::{GameType, RoomAddress, RoomSnapshot};
use crate::metrics::EngineMetrics;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub router: Arc<EventRouter>,
    pub metrics: Arc<EngineMetrics>,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub games: Vec<GameType>,
    pub rooms: Vec<RoomSnapshot>,
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
        connections: state.router.hub().connection_count(),
    })
}

/// GET /rooms
pub async fn rooms_handler(State(state): State<Arc<AppState>>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        games: state.router.engines().iter().map(|e| e.game_type()).collect(),
        rooms: state.router.room_summaries(),
    })
}

/// GET /rooms/:room
pub async fn room_handler(
    Extension(request_id): Extension<RequestId>,
    Path(room): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    RoomAddress::parse(&room)
        .and_then(|address| {
            state
                .router
                .engine(address.game_type)
                .and_then(|engine| engine.snapshot(&address.room_id))
        })
        .map(Json)
        .ok_or_else(|| ApiError::not_found(request_id.0, format!("Room {} does not exist", room)))
}

/// GET /metrics
pub async fn metrics_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::internal_error(request_id.0, e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Anything else
pub async fn not_found_handler(Extension(request_id): Extension<RequestId>) -> ApiError {
    ApiError::not_found(request_id.0, "No such endpoint".to_string())
}
