// Server mode - Prometheus remote-write receiver publishing to Kafka
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Kafka REST proxy or native librdkafka publishing
// - Structured logging with tracing
// - Graceful shutdown that drains the publisher queue

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prom2kafka_config::RuntimeConfig;
use prom2kafka_handlers::{IngestError, IngestPipeline};
use prom2kafka_publisher::Publisher;
use serde_json::json;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod handlers;
mod init;

use handlers::{handle_receive, health_check, healthz, ready_check};
use init::{init_publisher, init_tracing};
pub use init::bootstrap_subscriber;

/// Upper bound on waiting for the publisher to drain at shutdown.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<IngestPipeline>,
    publisher: Publisher,
}

impl AppState {
    pub fn new(pipeline: IngestPipeline, publisher: Publisher) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            publisher,
        }
    }
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: IngestError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request error: {}", self.error);
        } else {
            warn!("Rejected request: {}", self.error);
        }
        (
            self.status,
            Json(json!({
                "error": self.error.error_type(),
                "message": self.error.message(),
                "hint": self.error.hint(),
            })),
        )
            .into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(error: IngestError) -> Self {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, error }
    }
}

/// Build the HTTP router for `state`.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.pipeline.max_payload_bytes();
    Router::new()
        .route("/receive", post(handle_receive))
        .route("/health", get(health_check))
        .route("/healthz", get(healthz))
        .route("/ready", get(ready_check))
        // Bodies over the limit are never buffered in full; `handle_receive`
        // turns the extractor's rejection into the JSON 413.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point for server mode with a resolved configuration
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    let pipeline =
        IngestPipeline::from_config(&config).context("Failed to build ingest pipeline")?;
    info!(
        "Serialization format: {}, non-finite policy: {:?}",
        pipeline.serializer().format().as_str(),
        config.pipeline.non_finite
    );
    info!(
        "Max payload size set to {} bytes",
        pipeline.max_payload_bytes()
    );

    let (publisher, worker) = init_publisher(&config)?;
    let app = build_router(AppState::new(pipeline, publisher));

    let addr = &config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Remote-write endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  POST http://{}/receive  - Prometheus remote write", addr);
    info!("  GET  http://{}/health   - Health check", addr);
    info!("  GET  http://{}/healthz  - Health check (legacy format)", addr);
    info!("  GET  http://{}/ready    - Readiness check", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router, and with it every publisher handle, is gone: the worker
    // drains what was admitted and flushes the client.
    info!("Draining publisher queue...");
    match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Publisher worker ended abnormally: {}", e),
        Err(_) => warn!(
            "Publisher did not drain within {}s; remaining records are lost",
            SHUTDOWN_DRAIN_TIMEOUT.as_secs()
        ),
    }

    info!("Server shutdown complete");

    Ok(())
}
