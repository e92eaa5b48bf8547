// Router-level tests driven through tower's oneshot.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use prom2kafka_config::{PartialFailureStatus, RuntimeConfig};
use prom2kafka_handlers::IngestPipeline;
use prom2kafka_proto::{Label, Sample, TimeSeries, WriteRequest};
use prom2kafka_publisher::{MemoryClient, Publisher, PublisherOptions};
use prom2kafka_server::{build_router, AppState};
use prost::Message;
use serde_json::Value;
use tower::ServiceExt;

fn remote_write(name: &str, samples: &[(i64, f64)]) -> Vec<u8> {
    let request = WriteRequest {
        timeseries: vec![TimeSeries {
            labels: vec![
                Label {
                    name: "__name__".into(),
                    value: name.into(),
                },
                Label {
                    name: "instance".into(),
                    value: "localhost:9100".into(),
                },
            ],
            samples: samples
                .iter()
                .map(|(timestamp, value)| Sample {
                    timestamp: *timestamp,
                    value: *value,
                })
                .collect(),
            ..Default::default()
        }],
        ..Default::default()
    };
    snap::raw::Encoder::new()
        .compress_vec(&request.encode_to_vec())
        .unwrap()
}

fn app(config: &RuntimeConfig, client: MemoryClient, capacity: usize) -> (Router, Publisher) {
    let (publisher, _worker) = Publisher::start(
        client,
        PublisherOptions {
            queue_capacity: capacity,
            admission_timeout: Duration::from_millis(20),
            max_batch: 16,
        },
    );
    let pipeline = IngestPipeline::from_config(config).unwrap();
    (
        build_router(AppState::new(pipeline, publisher.clone())),
        publisher,
    )
}

fn receive(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/receive")
        .header("content-type", "application/x-protobuf")
        .header("content-encoding", "snappy")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_receive_ok() {
    let client = MemoryClient::new();
    let (app, _publisher) = app(&RuntimeConfig::default(), client, 64);

    let response = app
        .oneshot(receive(remote_write("up", &[(1_700_000_000_000, 1.0)])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["records"], 1);
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 0);
}

#[tokio::test]
async fn test_receive_corrupt_body_is_bad_request() {
    let (app, publisher) = app(&RuntimeConfig::default(), MemoryClient::new(), 64);

    let response = app
        .oneshot(receive(b"definitely not snappy".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"], "InvalidRequest");
    assert_eq!(publisher.stats().accepted, 0);
}

#[tokio::test]
async fn test_receive_saturated_is_service_unavailable() {
    let client = MemoryClient::new();
    client.pause();
    let (app, _publisher) = app(&RuntimeConfig::default(), client, 1);

    let response = app
        .oneshot(receive(remote_write("up", &[(1, 1.0), (2, 2.0)])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["status"], "partial");
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 1);
}

#[tokio::test]
async fn test_receive_saturated_with_partial_content() {
    let client = MemoryClient::new();
    client.pause();
    let mut config = RuntimeConfig::default();
    config.request.partial_failure_status = PartialFailureStatus::PartialContent;
    let (app, _publisher) = app(&config, client, 1);

    let response = app
        .oneshot(receive(remote_write("up", &[(1, 1.0), (2, 2.0)])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
}

#[tokio::test]
async fn test_receive_payload_too_large() {
    let mut config = RuntimeConfig::default();
    config.request.max_payload_bytes = 8;
    let (app, _publisher) = app(&config, MemoryClient::new(), 64);

    let response = app
        .clone()
        .oneshot(receive(remote_write("up", &[(1, 1.0)])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "PayloadTooLarge");
    assert_eq!(body["message"], "Payload exceeds limit of 8 bytes");
    assert!(body["hint"]
        .as_str()
        .unwrap()
        .contains("PROM2KAFKA_MAX_PAYLOAD_BYTES"));

    // With a Content-Length the reported size is exact.
    let payload = remote_write("up", &[(1, 1.0)]);
    let mut request = receive(payload.clone());
    request
        .headers_mut()
        .insert("content-length", payload.len().into());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "PayloadTooLarge");
    assert_eq!(
        body["message"],
        format!("Payload size {} bytes exceeds limit of 8 bytes", payload.len())
    );
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _publisher) = app(&RuntimeConfig::default(), MemoryClient::new(), 4);

    let response = app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "UP");

    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["publisher"]["capacity"], 4);
}

#[tokio::test]
async fn test_ready_fails_after_worker_stops() {
    let (publisher, worker) = Publisher::start(MemoryClient::new(), PublisherOptions::default());
    worker.abort();
    let _ = worker.await;
    let pipeline = IngestPipeline::from_config(&RuntimeConfig::default()).unwrap();
    let app = build_router(AppState::new(pipeline, publisher));

    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
