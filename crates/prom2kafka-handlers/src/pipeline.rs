use prom2kafka_config::{PartialFailureStatus, RuntimeConfig};
use prom2kafka_core::{
    decode_with_limits, DecodeLimits, Expansion, RecordEncoder, Router, SerializationError,
    SerializedPayload, Serializer, Transformer,
};
use prom2kafka_publisher::{Admission, Publisher, Rejection};
use tracing::debug;

use crate::error::IngestError;
use crate::outcome::{report_outcome, PublishOutcome};

/// The per-process, read-only half of request handling: every stage except
/// the publisher, built once at startup and shared by all requests.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    max_payload_bytes: usize,
    limits: DecodeLimits,
    transformer: Transformer,
    serializer: Serializer,
    router: Router,
    partial_failure_status: PartialFailureStatus,
}

impl IngestPipeline {
    pub fn new(
        max_payload_bytes: usize,
        limits: DecodeLimits,
        transformer: Transformer,
        serializer: Serializer,
        router: Router,
        partial_failure_status: PartialFailureStatus,
    ) -> Self {
        Self {
            max_payload_bytes,
            limits,
            transformer,
            serializer,
            router,
            partial_failure_status,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self, SerializationError> {
        let serializer = Serializer::new(
            config.serialization.format,
            config.serialization.schema_id,
            config.serialization.max_message_bytes,
        )?;
        let router = Router::new(
            config.routing.strategy(),
            config.routing.overrides.clone(),
            config.routing.partition_key.clone(),
        );
        Ok(Self::new(
            config.request.max_payload_bytes,
            DecodeLimits {
                max_decompressed_bytes: config.request.max_decompressed_bytes,
            },
            Transformer::new(config.pipeline.non_finite),
            serializer,
            router,
            config.request.partial_failure_status,
        ))
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    pub fn partial_failure_status(&self) -> PartialFailureStatus {
        self.partial_failure_status
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }
}

/// Run one remote-write body through decode, expand, serialize, route and
/// publish.
///
/// Admission waits for queue space only until the first timeout in this
/// request; later records are admitted only if space is free right away.
/// A publisher client error ends the request. Records admitted before it
/// stay admitted.
pub async fn process_remote_write(
    body: &[u8],
    pipeline: &IngestPipeline,
    publisher: &Publisher,
) -> Result<PublishOutcome, IngestError> {
    if body.len() > pipeline.max_payload_bytes {
        return Err(IngestError::PayloadTooLarge {
            size: Some(body.len()),
            limit: pipeline.max_payload_bytes,
        });
    }

    let batch = decode_with_limits(body, &pipeline.limits)?;
    let Expansion { records, skipped } = pipeline.transformer.expand(batch);
    let mut outcome = PublishOutcome::new(records.len(), skipped);
    let mut wait_for_space = true;

    for record in &records {
        let bytes = match pipeline.serializer.encode(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                outcome.serialization_failures += 1;
                debug!(metric = record.name(), error = %e, "Skipping unserializable record");
                continue;
            }
        };
        let payload = SerializedPayload::new(
            pipeline.router.route(record),
            pipeline.router.partition_key(record).map(str::to_string),
            bytes,
        );

        let admission = if wait_for_space {
            publisher.publish(payload).await
        } else {
            publisher.try_publish(payload)
        };
        match admission {
            Admission::Accepted => outcome.accepted += 1,
            Admission::Rejected(Rejection::Saturated) => {
                outcome.saturated += 1;
                wait_for_space = false;
            }
            Admission::Rejected(Rejection::ClientError(message)) => {
                report_outcome(&outcome);
                return Err(IngestError::PublishFailed {
                    message,
                    accepted: outcome.accepted,
                });
            }
        }
    }

    report_outcome(&outcome);
    Ok(outcome)
}
