//! Response normalization and fallback generation
//!
//! **[DVA-NORM-010]** JSON extraction from free-text model replies
//! **[DVA-NORM-020]** Probability normalization (each tier sums to 1.0)
//! **[DVA-FB-010]** Synthetic fallback analysis when Gemini is unavailable
//!
//! The vendor model returns free text that usually, but not always, contains
//! one JSON object. Everything downstream of the HTTP boundary works with the
//! validated `Analysis` produced here.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Tier 1 coarse classification probabilities (5 categories)
///
/// The key set is closed, so this is a record with named fields rather than
/// an open map. A missing key in the model reply deserializes to 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tier1Probs {
    pub fungal: f64,
    pub inflammatory: f64,
    pub normal: f64,
    pub malignant: f64,
    pub benign: f64,
}

/// Tier 2 fine-grained differential diagnosis probabilities (10 conditions)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tier2Probs {
    pub melanoma: f64,
    pub bcc: f64,
    pub eczema: f64,
    pub atopic_dermatitis: f64,
    pub melanocytic_nevi: f64,
    pub bkl: f64,
    pub psoriasis: f64,
    pub seborrheic_keratoses: f64,
    pub tinea: f64,
    pub warts: f64,
}

impl Tier1Probs {
    pub fn sum(&self) -> f64 {
        self.fungal + self.inflammatory + self.normal + self.malignant + self.benign
    }

    /// **[DVA-NORM-020]** Scale values so they sum to 1.0
    ///
    /// An all-zero tier (model omitted the sub-object, or sent zeros) is left
    /// unchanged rather than divided by zero.
    pub fn normalize(&mut self) {
        let total = self.sum();
        if total != 0.0 {
            for value in [
                &mut self.fungal,
                &mut self.inflammatory,
                &mut self.normal,
                &mut self.malignant,
                &mut self.benign,
            ] {
                *value /= total;
            }
        }
    }
}

impl Tier2Probs {
    pub fn sum(&self) -> f64 {
        self.melanoma
            + self.bcc
            + self.eczema
            + self.atopic_dermatitis
            + self.melanocytic_nevi
            + self.bkl
            + self.psoriasis
            + self.seborrheic_keratoses
            + self.tinea
            + self.warts
    }

    /// **[DVA-NORM-020]** Scale values so they sum to 1.0 (all-zero left unchanged)
    pub fn normalize(&mut self) {
        let total = self.sum();
        if total != 0.0 {
            for value in [
                &mut self.melanoma,
                &mut self.bcc,
                &mut self.eczema,
                &mut self.atopic_dermatitis,
                &mut self.melanocytic_nevi,
                &mut self.bkl,
                &mut self.psoriasis,
                &mut self.seborrheic_keratoses,
                &mut self.tinea,
                &mut self.warts,
            ] {
                *value /= total;
            }
        }
    }
}

/// Validated analysis result, built fresh per request and never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub tier1: Tier1Probs,
    pub tier2: Tier2Probs,
    pub description: String,
    pub recommendations: Vec<String>,
    pub confidence: f64,
}

/// Raw shape of the JSON object embedded in the model reply
///
/// Every field is optional; defaults are applied during normalization.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    tier1: Tier1Probs,
    #[serde(default)]
    tier2: Tier2Probs,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    recommendations: Option<Vec<String>>,
    #[serde(default)]
    confidence: Option<f64>,
}

const DEFAULT_DESCRIPTION: &str = "Analysis complete.";
const DEFAULT_RECOMMENDATION: &str = "Consult a dermatologist for professional evaluation.";
const DEFAULT_CONFIDENCE: f64 = 0.7;

const FALLBACK_DESCRIPTION: &str =
    "Image analysis complete. This is a simulated result for demonstration purposes.";
const FALLBACK_CONFIDENCE: f64 = 0.75;

/// **[DVA-NORM-010]** Parse and validate a free-text model reply
///
/// Extracts the first `{` through the last `}` and parses that span as JSON.
/// The greedy span is deliberate: it matches what the model is prompted to
/// emit, and changing it would change behavior on replies containing multiple
/// JSON-like fragments.
pub fn parse_model_output(raw_text: &str) -> Result<Analysis, AnalysisError> {
    let start = raw_text
        .find('{')
        .ok_or_else(|| AnalysisError::MalformedResponse("no JSON object in reply".to_string()))?;
    let end = raw_text
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| AnalysisError::MalformedResponse("no JSON object in reply".to_string()))?;

    let raw: RawAnalysis = serde_json::from_str(&raw_text[start..=end])
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    let mut tier1 = raw.tier1;
    let mut tier2 = raw.tier2;
    tier1.normalize();
    tier2.normalize();

    let description = match raw.description {
        Some(text) if !text.is_empty() => text,
        _ => DEFAULT_DESCRIPTION.to_string(),
    };
    let recommendations = match raw.recommendations {
        Some(list) if !list.is_empty() => list,
        _ => vec![DEFAULT_RECOMMENDATION.to_string()],
    };
    let confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);

    Ok(Analysis {
        tier1,
        tier2,
        description,
        recommendations,
        confidence,
    })
}

/// **[DVA-FB-010]** Generate a synthetic analysis
///
/// Used when Gemini is unconfigured, the call fails, or the reply cannot be
/// parsed. Each category is drawn uniformly from a fixed range chosen to look
/// plausible (benign-leaning), then the tier is normalized. All ranges are
/// strictly positive, so normalization cannot divide by zero.
pub fn generate_fallback() -> Analysis {
    let mut rng = rand::thread_rng();

    let mut tier1 = Tier1Probs {
        fungal: rng.gen_range(0.05..=0.15),
        inflammatory: rng.gen_range(0.10..=0.25),
        normal: rng.gen_range(0.05..=0.20),
        malignant: rng.gen_range(0.10..=0.35),
        benign: rng.gen_range(0.20..=0.40),
    };
    tier1.normalize();

    let mut tier2 = Tier2Probs {
        melanoma: rng.gen_range(0.05..=0.25),
        bcc: rng.gen_range(0.05..=0.20),
        eczema: rng.gen_range(0.08..=0.18),
        atopic_dermatitis: rng.gen_range(0.03..=0.10),
        melanocytic_nevi: rng.gen_range(0.08..=0.15),
        bkl: rng.gen_range(0.05..=0.12),
        psoriasis: rng.gen_range(0.02..=0.08),
        seborrheic_keratoses: rng.gen_range(0.03..=0.10),
        tinea: rng.gen_range(0.02..=0.06),
        warts: rng.gen_range(0.01..=0.05),
    };
    tier2.normalize();

    Analysis {
        tier1,
        tier2,
        description: FALLBACK_DESCRIPTION.to_string(),
        recommendations: vec![
            "Schedule an appointment with a dermatologist for professional evaluation".to_string(),
            "Monitor the lesion for any changes in size, shape, or color".to_string(),
            "Take regular photos to track progression over time".to_string(),
            "Protect the area from excessive sun exposure".to_string(),
        ],
        confidence: FALLBACK_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    #[test]
    fn test_tier_normalization_sums_to_one() {
        let reply = r#"{
            "tier1": {"fungal": 1, "inflammatory": 2, "normal": 3, "malignant": 4, "benign": 5},
            "tier2": {"melanoma": 0.3, "bcc": 0.3, "eczema": 0.9}
        }"#;

        let analysis = parse_model_output(reply).unwrap();
        assert!((analysis.tier1.sum() - 1.0).abs() < TOLERANCE);
        assert!((analysis.tier2.sum() - 1.0).abs() < TOLERANCE);
        assert!((analysis.tier1.benign - 5.0 / 15.0).abs() < TOLERANCE);
        assert!((analysis.tier2.eczema - 0.6).abs() < TOLERANCE);
    }

    #[test]
    fn test_all_zero_tier_left_unchanged() {
        let reply = r#"{"tier1": {"fungal": 0, "malignant": 0}, "tier2": {}}"#;

        let analysis = parse_model_output(reply).unwrap();
        assert_eq!(analysis.tier1, Tier1Probs::default());
        assert_eq!(analysis.tier2, Tier2Probs::default());
    }

    #[test]
    fn test_missing_tier_objects_yield_zeros() {
        let analysis = parse_model_output(r#"{"description": "ok"}"#).unwrap();
        assert_eq!(analysis.tier1.sum(), 0.0);
        assert_eq!(analysis.tier2.sum(), 0.0);
    }

    #[test]
    fn test_confidence_clamped_to_unit_interval() {
        for (input, expected) in [(-5.0, 0.0), (0.0, 0.0), (0.5, 0.5), (1.0, 1.0), (50.0, 1.0)] {
            let reply = format!(r#"{{"confidence": {}}}"#, input);
            let analysis = parse_model_output(&reply).unwrap();
            assert_eq!(analysis.confidence, expected, "input {}", input);
        }
    }

    #[test]
    fn test_confidence_defaults_when_absent() {
        let analysis = parse_model_output("{}").unwrap();
        assert_eq!(analysis.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_defaults_for_empty_description_and_recommendations() {
        let reply = r#"{"description": "", "recommendations": []}"#;

        let analysis = parse_model_output(reply).unwrap();
        assert_eq!(analysis.description, DEFAULT_DESCRIPTION);
        assert_eq!(analysis.recommendations, vec![DEFAULT_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn test_json_extracted_from_prose_wrapper() {
        let reply = concat!(
            "Sure! ",
            r#"{"tier1":{"malignant":2,"benign":2},"tier2":{},"description":"","#,
            r#""recommendations":[],"confidence":1.5}"#
        );

        let analysis = parse_model_output(reply).unwrap();
        assert!((analysis.tier1.malignant - 0.5).abs() < TOLERANCE);
        assert!((analysis.tier1.benign - 0.5).abs() < TOLERANCE);
        assert_eq!(analysis.tier1.fungal, 0.0);
        assert_eq!(analysis.tier2, Tier2Probs::default());
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(analysis.description, DEFAULT_DESCRIPTION);
        assert_eq!(analysis.recommendations, vec![DEFAULT_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn test_no_brace_span_is_malformed() {
        let err = parse_model_output("I cannot analyze this image.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_close_brace_before_open_brace_is_malformed() {
        let err = parse_model_output("} nothing here {").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_invalid_json_in_span_is_malformed() {
        let err = parse_model_output(r#"{"tier1": not json}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_fallback_distributions_sum_to_one() {
        for _ in 0..100 {
            let analysis = generate_fallback();
            assert!((analysis.tier1.sum() - 1.0).abs() < TOLERANCE);
            assert!((analysis.tier2.sum() - 1.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_fallback_fixed_fields() {
        let analysis = generate_fallback();
        assert_eq!(analysis.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(analysis.description, FALLBACK_DESCRIPTION);
        assert_eq!(analysis.recommendations.len(), 4);
    }

    #[test]
    fn test_fallback_values_positive() {
        let analysis = generate_fallback();
        for value in [
            analysis.tier1.fungal,
            analysis.tier1.inflammatory,
            analysis.tier1.normal,
            analysis.tier1.malignant,
            analysis.tier1.benign,
            analysis.tier2.melanoma,
            analysis.tier2.warts,
        ] {
            assert!(value > 0.0 && value < 1.0);
        }
    }

    #[test]
    fn test_tier2_camel_case_keys() {
        let reply = r#"{"tier2": {"atopicDermatitis": 1.0, "melanocyticNevi": 1.0,
                        "seborrheicKeratoses": 2.0}}"#;

        let analysis = parse_model_output(reply).unwrap();
        assert!((analysis.tier2.atopic_dermatitis - 0.25).abs() < TOLERANCE);
        assert!((analysis.tier2.melanocytic_nevi - 0.25).abs() < TOLERANCE);
        assert!((analysis.tier2.seborrheic_keratoses - 0.5).abs() < TOLERANCE);

        let json = serde_json::to_value(analysis.tier2).unwrap();
        assert!(json.get("atopicDermatitis").is_some());
        assert!(json.get("seborrheicKeratoses").is_some());
    }
}
