//! Error types for the analysis backend
//!
//! **[DVA-ERR-010]** Analysis errors are absorbed at the request boundary:
//! every kind below is converted into a successful fallback response, never
//! into a non-2xx status. `ApiError` covers the few request-shape problems
//! the framework does surface (e.g. a multipart form without a file).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures on the vendor analysis path
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No Gemini API key present in the environment
    #[error("Gemini API not configured")]
    VendorUnconfigured,

    /// Network, auth, or quota failure talking to Gemini
    #[error("Gemini call failed: {0}")]
    VendorCallFailed(String),

    /// Model reply contained no parseable JSON object
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Request image was not valid base64
    #[error("Invalid base64 image data: {0}")]
    InvalidImage(#[from] base64::DecodeError),
}

/// HTTP boundary errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
