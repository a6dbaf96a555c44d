//! Health and status endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::api::types::StatusResponse;
use crate::core_state::CoreState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
    })
}

/// `GET /api/status`: loader state, running operations and unexpired notices.
pub async fn status(State(core): State<Arc<CoreState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        loading: core.loader.is_loading(),
        in_flight: core.operations.in_flight(),
        notifications: core.notices.active(Utc::now()),
    })
}
