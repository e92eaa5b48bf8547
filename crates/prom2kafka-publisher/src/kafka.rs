// Native Kafka client on librdkafka's FutureProducer.
//
// send_batch enqueues every record into librdkafka's own queue and returns.
// Delivery futures are awaited on a separate task that feeds the reporter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use prom2kafka_core::SerializedPayload;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info};

use crate::client::{ClientError, LogClient};
use crate::stats::DeliveryReporter;

const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(10);

pub struct KafkaClient {
    producer: FutureProducer,
    enqueue_timeout: Duration,
    flush_timeout: Duration,
}

impl KafkaClient {
    /// Build a producer from librdkafka properties.
    ///
    /// `flush_timeout` bounds both how long a record may wait for room in
    /// librdkafka's local queue and the final flush at shutdown.
    pub fn new<K, V, I>(properties: I, flush_timeout: Duration) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut config = ClientConfig::new();
        for (key, value) in properties {
            config.set(key, value);
        }
        let producer: FutureProducer = config
            .create()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        info!("Kafka producer created");
        Ok(Self {
            producer,
            enqueue_timeout: flush_timeout,
            flush_timeout,
        })
    }

    async fn enqueue(&self, payload: &SerializedPayload) -> Result<DeliveryFuture, ClientError> {
        let mut record: FutureRecord<'_, str, [u8]> =
            FutureRecord::to(&payload.topic).payload(&payload.bytes[..]);
        if let Some(key) = &payload.key {
            record = record.key(key.as_str());
        }

        let deadline = Instant::now() + self.enqueue_timeout;
        loop {
            match self.producer.send_result(record) {
                Ok(future) => return Ok(future),
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned))
                    if Instant::now() < deadline =>
                {
                    record = returned;
                    tokio::time::sleep(QUEUE_FULL_BACKOFF).await;
                }
                Err((e, _)) => return Err(map_error(&payload.topic, &e)),
            }
        }
    }
}

fn map_error(topic: &str, err: &KafkaError) -> ClientError {
    match err {
        KafkaError::MessageProduction(
            RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic,
        ) => ClientError::UnknownTopic(topic.to_string()),
        KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => ClientError::QueueFull,
        other => ClientError::Transport(other.to_string()),
    }
}

#[async_trait]
impl LogClient for KafkaClient {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn send_batch(&self, batch: Vec<SerializedPayload>, reporter: &DeliveryReporter) {
        let mut pending = Vec::with_capacity(batch.len());
        for payload in &batch {
            match self.enqueue(payload).await {
                Ok(future) => pending.push((payload.topic.clone(), future)),
                Err(e) => reporter.failed(&payload.topic, 1, &e),
            }
        }
        debug!(enqueued = pending.len(), "Handed batch to librdkafka");

        let reporter = reporter.clone();
        tokio::spawn(async move {
            for (topic, future) in pending {
                match future.await {
                    Ok(Ok(_)) => reporter.delivered(&topic, 1),
                    Ok(Err((e, _))) => reporter.failed(&topic, 1, &map_error(&topic, &e)),
                    Err(_) => reporter.failed(
                        &topic,
                        1,
                        &ClientError::Transport("delivery report dropped".to_string()),
                    ),
                }
            }
        });
    }

    async fn flush(&self) -> Result<(), ClientError> {
        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| ClientError::Transport(format!("flush task failed: {}", e)))?
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
