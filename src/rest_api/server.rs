//! Axum HTTP server for health and metrics

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{Error, Result};

use super::handlers;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

pub fn router() -> Router {
    let app = Router::new().route("/health", get(handlers::health));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(handlers::metrics));

    app.layer(TraceLayer::new_for_http())
}

/// Serve until the process exits.
pub async fn run_server(addr: SocketAddr) -> Result<()> {
    info!("Health endpoint listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, router())
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}
