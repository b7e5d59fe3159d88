//! HTTP API handlers
//!
//! **[DVA-API-010]** POST /analyze
//! **[DVA-API-020]** POST /analyze-upload
//! **[DVA-API-030]** GET / (health)

pub mod analyze;
pub mod health;

pub use analyze::analyze_routes;
pub use health::health_routes;
