// Kafka REST Proxy (v2) client.
//
// POST {base}/topics/{topic}
// Content-Type: application/vnd.kafka.binary.v2+json
// {"records":[{"key":"<base64>","value":"<base64>"}, ...]}

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use prom2kafka_core::SerializedPayload;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{group_by_topic, ClientError, LogClient};
use crate::stats::DeliveryReporter;

const CONTENT_TYPE: &str = "application/vnd.kafka.binary.v2+json";
const ACCEPT: &str = "application/vnd.kafka.v2+json";
/// REST proxy error code for a topic that does not exist.
const TOPIC_NOT_FOUND: i64 = 40401;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
pub(crate) struct ProduceRequest {
    records: Vec<ProduceRecord>,
}

#[derive(Debug, Serialize)]
struct ProduceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<PartitionOffset>,
}

#[derive(Debug, Deserialize)]
struct PartitionOffset {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct RestProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestProxyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn produce(&self, topic: &str, body: &ProduceRequest) -> Result<usize, ClientError> {
        let url = format!("{}/topics/{}", self.base_url, topic);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(topic, status.as_u16(), &text));
        }

        let parsed: ProduceResponse = serde_json::from_str(&text).map_err(|e| {
            ClientError::Rejected {
                status: status.as_u16(),
                message: format!("unreadable produce response: {}", e),
            }
        })?;
        let failed: Vec<&PartitionOffset> = parsed
            .offsets
            .iter()
            .filter(|o| o.error_code.is_some())
            .collect();
        if let Some(first) = failed.first() {
            warn!(
                topic,
                failed = failed.len(),
                error = first.error.as_deref().unwrap_or("unknown"),
                "REST proxy rejected some records"
            );
        }
        Ok(failed.len())
    }
}

pub(crate) fn encode_records(items: &[SerializedPayload]) -> ProduceRequest {
    ProduceRequest {
        records: items
            .iter()
            .map(|p| ProduceRecord {
                key: p.key.as_ref().map(|k| STANDARD.encode(k.as_bytes())),
                value: STANDARD.encode(&p.bytes),
            })
            .collect(),
    }
}

fn classify_error(topic: &str, status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if err.error_code == TOPIC_NOT_FOUND => ClientError::UnknownTopic(topic.to_string()),
        Ok(err) => ClientError::Rejected {
            status,
            message: err.message,
        },
        Err(_) => ClientError::Rejected {
            status,
            message: body.chars().take(256).collect(),
        },
    }
}

fn is_retryable(err: &ClientError) -> bool {
    match err {
        ClientError::Transport(_) => true,
        ClientError::Rejected { status, .. } => *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl LogClient for RestProxyClient {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn send_batch(&self, batch: Vec<SerializedPayload>, reporter: &DeliveryReporter) {
        for (topic, items) in group_by_topic(batch) {
            let body = encode_records(&items);
            let mut attempt = 1;
            loop {
                match self.produce(&topic, &body).await {
                    Ok(failed) => {
                        reporter.delivered(&topic, items.len().saturating_sub(failed));
                        reporter.failed(
                            &topic,
                            failed,
                            &ClientError::Rejected {
                                status: 200,
                                message: "partition error".into(),
                            },
                        );
                        break;
                    }
                    Err(e) if attempt < MAX_ATTEMPTS && is_retryable(&e) => {
                        debug!(topic = %topic, attempt, error = %e, "Retrying REST proxy produce");
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                        attempt += 1;
                    }
                    Err(e) => {
                        reporter.failed(&topic, items.len(), &e);
                        break;
                    }
                }
            }
        }
    }

    async fn flush(&self) -> Result<(), ClientError> {
        // Every produce call is awaited in send_batch.
        Ok(())
    }
}
