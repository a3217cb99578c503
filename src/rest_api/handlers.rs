//! HTTP handlers for the health endpoint

use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Metrics endpoint handler
#[cfg(feature = "metrics")]
pub async fn metrics() -> Result<String, axum::http::StatusCode> {
    crate::controller::metrics::encode_registry().map_err(|e| {
        tracing::error!("Failed to encode metrics: {}", e);
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    })
}
