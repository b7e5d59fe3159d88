//! Skin lesion analysis endpoints
//!
//! **[DVA-API-010]** POST /analyze (base64 image in a JSON body)
//! **[DVA-API-020]** POST /analyze-upload (multipart file upload)
//!
//! **[DVA-ERR-010]** Both endpoints answer 200 regardless of what happens on
//! the vendor path. A Gemini failure of any kind is absorbed into a synthetic
//! fallback response; the only caller-visible signal is the `error` field.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, ApiError, ApiResult};
use crate::services::{
    analysis_prompt, generate_fallback, parse_model_output, Analysis, GeminiClient, Tier1Probs,
    Tier2Probs,
};
use crate::AppState;

const DEMO_MODE_SUFFIX: &str = " (Demo mode - Gemini API not configured)";

/// POST /analyze request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub image_base64: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

/// Analysis response shared by both endpoints
///
/// `error` is serialized as JSON null on the success and demo-mode paths.
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub tier1: Tier1Probs,
    pub tier2: Tier2Probs,
    pub ai_malignant_prob: f64,
    pub description: String,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub error: Option<String>,
}

impl AnalysisResponse {
    fn from_analysis(analysis: Analysis, error: Option<String>) -> Self {
        Self {
            success: true,
            ai_malignant_prob: analysis.tier1.malignant,
            tier1: analysis.tier1,
            tier2: analysis.tier2,
            description: analysis.description,
            recommendations: analysis.recommendations,
            confidence: analysis.confidence,
            error,
        }
    }
}

/// **[DVA-API-010]** POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<AnalysisResponse> {
    Json(run_analysis(&state, request).await)
}

/// **[DVA-API-020]** POST /analyze-upload
///
/// Accepts a multipart form with a `file` part (image bytes) and an optional
/// `language` part. Re-encodes the bytes to base64 and delegates to the
/// /analyze logic.
pub async fn analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<AnalysisResponse>> {
    let mut file: Option<Vec<u8>> = None;
    let mut language = default_language();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart form: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some(bytes.to_vec());
            }
            Some("language") => {
                language = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read language: {}", e)))?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let request = AnalyzeRequest {
        image_base64: STANDARD.encode(&file),
        language,
    };
    Ok(Json(run_analysis(&state, request).await))
}

/// Two-branch dispatch: vendor path when configured and healthy, fallback
/// otherwise
async fn run_analysis(state: &AppState, request: AnalyzeRequest) -> AnalysisResponse {
    let result = match &state.gemini {
        Some(client) => vendor_analysis(client, &request).await,
        None => Err(AnalysisError::VendorUnconfigured),
    };

    match result {
        Ok(analysis) => AnalysisResponse::from_analysis(analysis, None),
        Err(AnalysisError::VendorUnconfigured) => {
            let mut analysis = generate_fallback();
            analysis.description.push_str(DEMO_MODE_SUFFIX);
            AnalysisResponse::from_analysis(analysis, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Vendor analysis failed, serving fallback");
            AnalysisResponse::from_analysis(
                generate_fallback(),
                Some(format!("Using fallback: {}", e)),
            )
        }
    }
}

/// Call Gemini and normalize its reply
async fn vendor_analysis(
    client: &GeminiClient,
    request: &AnalyzeRequest,
) -> Result<Analysis, AnalysisError> {
    let image = STANDARD.decode(strip_data_url_prefix(&request.image_base64))?;
    let prompt = analysis_prompt(&request.language);
    let reply = client.analyze_image(&prompt, &image).await?;
    parse_model_output(&reply)
}

/// Drop a `data:image/...;base64,` prefix when the client sends a data URL
fn strip_data_url_prefix(image_base64: &str) -> &str {
    match image_base64.split_once(',') {
        Some((_, encoded)) => encoded,
        None => image_base64,
    }
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyze-upload", post(analyze_upload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_prefix_stripped() {
        assert_eq!(
            strip_data_url_prefix("data:image/png;base64,aGVsbG8="),
            "aGVsbG8="
        );
        assert_eq!(strip_data_url_prefix("aGVsbG8="), "aGVsbG8=");
    }

    #[test]
    fn test_response_derives_malignant_probability() {
        let mut analysis = generate_fallback();
        analysis.tier1.malignant = 0.42;

        let response = AnalysisResponse::from_analysis(analysis, None);
        assert_eq!(response.ai_malignant_prob, 0.42);
        assert!(response.success);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_language_defaults_to_english() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"image_base64": "aGVsbG8="}"#).unwrap();
        assert_eq!(request.language, "en");
    }
}
