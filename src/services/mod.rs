//! Service-layer components
//!
//! **[DVA-INT-010]** Gemini vision client
//! **[DVA-NORM-010]** Reply normalization and fallback generation

pub mod gemini_client;
pub mod normalizer;

pub use gemini_client::{analysis_prompt, GeminiClient};
pub use normalizer::{generate_fallback, parse_model_output, Analysis, Tier1Probs, Tier2Probs};
