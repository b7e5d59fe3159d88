//! DermaVision analysis backend
//!
//! Thin HTTP relay between a frontend and the Google Gemini vision model:
//! accepts a base64-encoded skin lesion image plus a language code, forwards
//! them with a fixed prompt, normalizes the model's JSON reply into two
//! probability distributions, and serves synthetic fallback analysis whenever
//! the vendor is unconfigured or fails.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{AnalysisError, ApiError, ApiResult};
pub use crate::services::GeminiClient;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body; covers high-resolution phone photos
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across HTTP handlers
///
/// Requests are stateless and independent; the only shared value is the
/// vendor client resolved once at startup. `None` means demo mode: every
/// request takes the fallback path.
#[derive(Clone)]
pub struct AppState {
    pub gemini: Option<GeminiClient>,
}

impl AppState {
    /// Create new application state
    pub fn new(gemini: Option<GeminiClient>) -> Self {
        Self { gemini }
    }
}

/// Build application router
///
/// CORS is permissive: the frontend is served from a different origin and
/// the API carries no credentials.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::analyze_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
