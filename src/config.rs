//! Configuration resolution
//!
//! **[DVA-CFG-010]** The Gemini credential is resolved once at startup and
//! handed to `AppState` explicitly; nothing reads the environment per-request.

/// Environment variables checked for the Gemini API key, in priority order
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_GEMINI_API_KEY", "GEMINI_API_KEY"];

/// Resolve the Gemini API key from the environment
///
/// Returns `None` when neither variable is set to a usable value, in which
/// case the service runs in demo mode and every request takes the fallback
/// path.
pub fn resolve_api_key() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|key| is_valid_key(key)))
}

/// Validate an API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
