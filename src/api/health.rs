//! Health check endpoint
//!
//! **[DVA-API-030]** GET / reports service identity and whether the Gemini
//! credential was resolved at startup.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub gemini_configured: bool,
}

/// GET /
///
/// No side effects; safe for load-balancer probes.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "DermaVision AI Backend".to_string(),
        gemini_configured: state.gemini.is_some(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
