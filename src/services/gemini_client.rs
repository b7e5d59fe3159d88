//! Google Gemini vision client
//!
//! **[DVA-INT-010]** Vendor model integration over the Generative Language
//! REST API. The model is treated as an opaque collaborator: we send a prompt
//! plus an inline image and get back free text that should contain JSON.
//!
//! No timeout, retry, or backpressure policy of our own: any transport or
//! API failure is reported uniformly as `VendorCallFailed` and the caller
//! falls back to synthetic analysis.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Gemini REST client
///
/// Cheap to clone (reqwest's client is an Arc internally); one instance is
/// created at startup and shared through `AppState`.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// generateContent request body
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<ContentPayload>,
}

#[derive(Debug, Serialize)]
struct ContentPayload {
    parts: Vec<PartPayload>,
}

#[derive(Debug, Serialize)]
struct PartPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// generateContent response (simplified)
///
/// The full response carries safety ratings and usage metadata; we only need
/// the candidate text.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if any
    fn reply_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiClient {
    /// Create a client against the production Gemini endpoint
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, GEMINI_BASE_URL.to_string())
    }

    /// Create a client with an explicit base URL (used by tests)
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// **[DVA-INT-010]** Send the analysis prompt and image to Gemini
    ///
    /// Returns the model's free-text reply. The image is sent as inline JPEG
    /// data regardless of its actual encoding; Gemini sniffs the content.
    pub async fn analyze_image(
        &self,
        prompt: &str,
        image: &[u8],
    ) -> Result<String, AnalysisError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, GEMINI_MODEL
        );
        let body = GenerateContentRequest {
            contents: vec![ContentPayload {
                parts: vec![
                    PartPayload {
                        text: Some(prompt.to_string()),
                        inline_data: None,
                    },
                    PartPayload {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: STANDARD.encode(image),
                        }),
                    },
                ],
            }],
        };

        tracing::debug!(image_bytes = image.len(), model = GEMINI_MODEL, "Calling Gemini");

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::VendorCallFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AnalysisError::VendorCallFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::VendorCallFailed(e.to_string()))?;

        reply.reply_text().ok_or_else(|| {
            AnalysisError::VendorCallFailed("no candidate text in Gemini response".to_string())
        })
    }
}

/// **[DVA-INT-020]** Build the analysis prompt for a language code
///
/// Supported codes: en, hi, ta, te, bn, mr; anything else falls back to
/// English. The template instructs the model to answer with one JSON object
/// matching the tier1/tier2 schema the normalizer expects.
pub fn analysis_prompt(language: &str) -> String {
    let lang_instruction = match language {
        "hi" => "Respond in Hindi (हिंदी).",
        "ta" => "Respond in Tamil (தமிழ்).",
        "te" => "Respond in Telugu (తెలుగు).",
        "bn" => "Respond in Bengali (বাংলা).",
        "mr" => "Respond in Marathi (मराठी).",
        _ => "Respond in English.",
    };

    format!(
        r#"You are a dermatological AI assistant analyzing a skin lesion image.
{lang_instruction}

Analyze this skin image and provide a detailed assessment in JSON format with the following structure:

{{
  "tier1": {{
    "fungal": <probability 0-1>,
    "inflammatory": <probability 0-1>,
    "normal": <probability 0-1>,
    "malignant": <probability 0-1>,
    "benign": <probability 0-1>
  }},
  "tier2": {{
    "melanoma": <probability 0-1>,
    "bcc": <probability 0-1 for Basal Cell Carcinoma>,
    "eczema": <probability 0-1>,
    "atopicDermatitis": <probability 0-1>,
    "melanocyticNevi": <probability 0-1 for moles>,
    "bkl": <probability 0-1 for Benign Keratosis>,
    "psoriasis": <probability 0-1>,
    "seborrheicKeratoses": <probability 0-1>,
    "tinea": <probability 0-1 for ringworm>,
    "warts": <probability 0-1>
  }},
  "description": "<brief description of what you observe>",
  "recommendations": ["<list of 3-5 recommendations>"],
  "confidence": <overall confidence 0-1>
}}

IMPORTANT:
- All tier1 probabilities must sum to 1.0
- All tier2 probabilities must sum to 1.0
- Be conservative with malignancy assessments
- Recommend professional consultation for any concerning findings
- Return ONLY valid JSON, no additional text

Analyze the image now:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_language_selection() {
        assert!(analysis_prompt("hi").contains("Respond in Hindi"));
        assert!(analysis_prompt("ta").contains("Respond in Tamil"));
        assert!(analysis_prompt("en").contains("Respond in English."));
    }

    #[test]
    fn test_prompt_unknown_language_falls_back_to_english() {
        assert!(analysis_prompt("fr").contains("Respond in English."));
        assert!(analysis_prompt("").contains("Respond in English."));
    }

    #[test]
    fn test_prompt_names_full_schema() {
        let prompt = analysis_prompt("en");
        for key in ["tier1", "tier2", "atopicDermatitis", "seborrheicKeratoses", "confidence"] {
            assert!(prompt.contains(key), "prompt missing {}", key);
        }
    }

    #[test]
    fn test_response_text_extraction() {
        let json_str = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is the analysis: "},
                        {"text": "{\"tier1\": {}}"}
                    ]
                }
            }]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json_str).unwrap();
        assert_eq!(
            response.reply_text().unwrap(),
            "Here is the analysis: {\"tier1\": {}}"
        );
    }

    #[test]
    fn test_empty_candidates_yield_no_text() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.reply_text().is_none());

        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": []}}]}"#).unwrap();
        assert!(response.reply_text().is_none());
    }

    #[test]
    fn test_request_body_wire_shape() {
        let body = GenerateContentRequest {
            contents: vec![ContentPayload {
                parts: vec![
                    PartPayload {
                        text: Some("prompt".to_string()),
                        inline_data: None,
                    },
                    PartPayload {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: "aGVsbG8=".to_string(),
                        }),
                    },
                ],
            }],
        };

        let value = serde_json::to_value(&body).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "prompt");
        assert!(parts[0].get("inline_data").is_none());
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "aGVsbG8=");
    }
}
