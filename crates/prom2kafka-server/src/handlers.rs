// HTTP request handlers for server mode
//
// Implements remote-write ingestion and health check endpoints

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::{counter, histogram};
use prom2kafka_handlers::{process_remote_write, IngestError};
use serde_json::json;
use tracing::{debug, warn};

use crate::{AppError, AppState};

/// POST /receive - Prometheus remote-write endpoint
pub(crate) async fn handle_receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let limit = state.pipeline.max_payload_bytes();
    let body = body.map_err(|rejection| body_rejection(&rejection, &headers, limit))?;
    let start = Instant::now();
    counter!("prom2kafka.ingest.requests", 1);
    histogram!("prom2kafka.ingest.bytes", body.len() as f64);
    debug!("Received remote-write request ({} bytes)", body.len());

    let outcome = process_remote_write(&body, &state.pipeline, &state.publisher).await?;
    let status = StatusCode::from_u16(
        outcome.status_code(state.pipeline.partial_failure_status()),
    )
    .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);

    histogram!(
        "prom2kafka.ingest.latency_ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    debug!(
        records = outcome.records,
        accepted = outcome.accepted,
        rejected = outcome.saturated,
        status = status.as_u16(),
        "Processed remote-write request"
    );

    let response = Json(json!({
        "status": if outcome.is_complete() { "ok" } else { "partial" },
        "records": outcome.records,
        "accepted": outcome.accepted,
        "rejected": outcome.saturated,
        "serialization_failures": outcome.serialization_failures,
        "skipped_samples": outcome.skipped.total(),
        "invalid_series": outcome.skipped.invalid_series,
    }));
    Ok((status, response).into_response())
}

/// Body extraction failures use the same JSON error shape as the pipeline.
fn body_rejection(rejection: &BytesRejection, headers: &HeaderMap, limit: usize) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        IngestError::PayloadTooLarge { size, limit }.into()
    } else {
        IngestError::InvalidRequest {
            message: rejection.body_text(),
            hint: None,
        }
        .into()
    }
}

/// GET /health - Basic health check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// GET /healthz - Liveness check in the legacy adapter's format
pub(crate) async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "UP"})))
}

/// GET /ready - Readiness check (publisher worker must be running)
pub(crate) async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.publisher.stats();
    if state.publisher.is_running() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "backend": state.publisher.backend(),
                "publisher": stats,
            })),
        )
    } else {
        warn!("Readiness check failed: publisher worker has stopped");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "backend": state.publisher.backend(),
                "error": "publisher worker has stopped",
            })),
        )
    }
}
