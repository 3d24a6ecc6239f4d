//! Prometheus `/metrics` endpoint served alongside a run.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handler for `/metrics`: every registered metric in text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("Content-Type", encoder.format_type().to_string())],
            Body::from(buffer),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {e}"),
        )
            .into_response(),
    }
}

pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Background metrics server.
pub struct MetricsServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MetricsServer {
    /// Binds `addr` and starts serving in the background.
    pub async fn start(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "serving metrics");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router()).await {
                warn!(error = %e, "metrics server stopped");
            }
        });

        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Keeps serving for `linger` so the final values get scraped, then stops.
    pub async fn shutdown_after(self, linger: Duration) {
        if !linger.is_zero() {
            info!(linger_secs = linger.as_secs(), "keeping metrics endpoint up");
            tokio::time::sleep(linger).await;
        }
        self.handle.abort();
    }
}
