// Publisher -> RestProxyClient against an in-process fake REST proxy.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use prom2kafka_core::SerializedPayload;
use prom2kafka_publisher::{Publisher, PublisherOptions, RestProxyClient};
use serde_json::{json, Value};

/// Request bodies seen by the fake proxy, with their topic.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<(String, Value)>>>);

async fn produce(
    State(captured): State<Captured>,
    Path(topic): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if topic == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error_code": 40401, "message": "Topic not found."})),
        );
    }
    let count = body["records"].as_array().map(|r| r.len()).unwrap_or(0);
    captured.0.lock().unwrap().push((topic, body));
    let offsets: Vec<Value> = (0..count)
        .map(|i| json!({"partition": 0, "offset": i}))
        .collect();
    (StatusCode::OK, Json(json!({ "offsets": offsets })))
}

async fn spawn_proxy(captured: Captured) -> String {
    let app = Router::new()
        .route("/topics/:topic", post(produce))
        .with_state(captured);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn wait_for_delivered(publisher: &Publisher, delivered: u64) {
    for _ in 0..200 {
        if publisher.stats().delivered == delivered {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(publisher.stats().delivered, delivered);
}

fn payload(topic: &str, key: Option<&str>, value: &[u8]) -> SerializedPayload {
    SerializedPayload::new(Arc::from(topic), key.map(String::from), value.to_vec())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publishes_through_rest_proxy() {
    let captured = Captured::default();
    let url = spawn_proxy(captured.clone()).await;

    let client = RestProxyClient::new(url, Duration::from_secs(5)).unwrap();
    let (publisher, worker) = Publisher::start(client, PublisherOptions::default());

    assert!(publisher
        .publish(payload("metrics", Some("up"), b"{\"a\":1}"))
        .await
        .is_accepted());
    assert!(publisher
        .publish(payload("metrics", None, b"{\"a\":2}"))
        .await
        .is_accepted());
    assert!(publisher
        .publish(payload("other", Some("x"), b"{}"))
        .await
        .is_accepted());

    let stats = publisher.clone();
    drop(publisher);
    wait_for_delivered(&stats, 3).await;
    drop(stats);
    worker.await.unwrap();

    let seen = captured.0.lock().unwrap().clone();
    let metrics: Vec<&Value> = seen
        .iter()
        .filter(|(t, _)| t == "metrics")
        .map(|(_, b)| b)
        .collect();
    let records: Vec<&Value> = metrics
        .iter()
        .flat_map(|b| b["records"].as_array().unwrap().iter())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["key"], "dXA=");
    assert_eq!(records[0]["value"], "eyJhIjoxfQ==");
    assert!(records[1].get("key").is_none());
    assert!(seen.iter().any(|(t, _)| t == "other"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_topic_from_proxy_blocks_later_records() {
    let url = spawn_proxy(Captured::default()).await;
    let client = RestProxyClient::new(url, Duration::from_secs(5)).unwrap();
    let (publisher, _worker) = Publisher::start(client, PublisherOptions::default());

    assert!(publisher
        .publish(payload("missing", None, b"{}"))
        .await
        .is_accepted());
    for _ in 0..200 {
        if publisher.stats().delivery_failures == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(publisher.stats().delivery_failures, 1);
    assert!(!publisher
        .publish(payload("missing", None, b"{}"))
        .await
        .is_accepted());
}
