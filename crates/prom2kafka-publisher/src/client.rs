//! The seam between the publisher worker and a concrete log client.

use async_trait::async_trait;
use prom2kafka_core::SerializedPayload;

use crate::stats::DeliveryReporter;

/// Failures reported by a log client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The log does not know the destination topic.
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    /// The client could not be built from its configuration.
    #[error("client configuration error: {0}")]
    Config(String),

    /// The log was unreachable or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The log answered but refused the records.
    #[error("log rejected records (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The client's own queue stayed full past the delivery timeout.
    #[error("client queue full")]
    QueueFull,
}

/// An external log client with an asynchronous send primitive.
///
/// `send_batch` must hand every payload to the client's own send machinery
/// before returning; it may return before delivery is confirmed. Delivery
/// outcomes are reported through `reporter`, never returned to the caller.
#[async_trait]
pub trait LogClient: Send + Sync + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn send_batch(&self, batch: Vec<SerializedPayload>, reporter: &DeliveryReporter);

    /// Wait for in-flight sends to complete. Called once at shutdown.
    async fn flush(&self) -> Result<(), ClientError>;
}

/// Group payloads by topic, keeping first-seen topic order and the original
/// order within each topic.
pub(crate) fn group_by_topic(batch: Vec<SerializedPayload>) -> Vec<(String, Vec<SerializedPayload>)> {
    let mut groups: Vec<(String, Vec<SerializedPayload>)> = Vec::new();
    for payload in batch {
        match groups.iter_mut().find(|(t, _)| **t == *payload.topic) {
            Some((_, items)) => items.push(payload),
            None => groups.push((payload.topic.to_string(), vec![payload])),
        }
    }
    groups
}
