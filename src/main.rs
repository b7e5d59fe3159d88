//! dermavision - AI skin analysis backend
//!
//! **[DVA-OV-010]** HTTP relay to the Google Gemini vision model with
//! synthetic fallback when no credential is configured.
//!
//! Run with GOOGLE_GEMINI_API_KEY (or GEMINI_API_KEY) set to enable the
//! vendor path; without either the service runs in demo mode.

use anyhow::Result;
use dermavision::{build_router, config, AppState, GeminiClient};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting DermaVision AI Backend v{}",
        env!("CARGO_PKG_VERSION")
    );

    // [DVA-CFG-010] Resolve the vendor credential once; handlers never read
    // the environment.
    let gemini = match config::resolve_api_key() {
        Some(api_key) => {
            info!("Gemini API key resolved from environment");
            Some(GeminiClient::new(api_key))
        }
        None => {
            warn!(
                "No Gemini API key found ({}); running in demo mode with fallback analysis",
                config::API_KEY_ENV_VARS.join(" or ")
            );
            None
        }
    };

    let state = AppState::new(gemini);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
    info!("Listening on http://0.0.0.0:8000");
    info!("Health check: http://0.0.0.0:8000/");

    axum::serve(listener, app).await?;

    Ok(())
}
