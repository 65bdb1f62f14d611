// HTTP server for the Prometheus metrics endpoint
//
// Serves /metrics and /health on a separate port from the MCP transport.

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tracing::{error, info};

use crate::metrics;

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(host: [u8; 4], port: u16) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let addr = SocketAddr::from((host, port));
    info!("Starting metrics server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind metrics server")?;

    axum::serve(listener, router())
        .await
        .context("Metrics server error")?;

    Ok(())
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
