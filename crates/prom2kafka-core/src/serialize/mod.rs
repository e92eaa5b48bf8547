// Record serializers
//
// The encoding is chosen once at startup; the hot path dispatches on a closed
// enum. Encoding never mutates the record and does not depend on where the
// payload is routed.

mod avro;
mod json;

pub use avro::{AvroEncoder, METRIC_SCHEMA, METRIC_SCHEMA_NAME};
pub use json::JsonEncoder;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Default upper bound for one encoded record (Kafka's default `message.max.bytes`).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1_000_000;

/// Per-record encoding failure. The record is skipped and counted.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("timestamp {0}ms is outside the representable range")]
    TimestampOutOfRange(i64),

    #[error("encoded record is {size} bytes, exceeding the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Avro encoding failed: {0}")]
    Avro(String),
}

/// The single capability every encoding provides.
pub trait RecordEncoder {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, SerializationError>;
}

/// Configured encoding selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// Self-describing JSON object per record.
    #[default]
    Json,
    /// Avro binary against the fixed metric schema.
    Avro,
}

impl SerializationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            SerializationFormat::Avro => "avro",
        }
    }
}

impl std::str::FromStr for SerializationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SerializationFormat::Json),
            "avro" | "avro-binary" => Ok(SerializationFormat::Avro),
            other => Err(format!(
                "unsupported serialization format '{}', expected 'json' or 'avro'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Serializer {
    Json(JsonEncoder),
    Avro(AvroEncoder),
}

impl Serializer {
    /// Build the encoder for `format`. `schema_id` selects Confluent framing
    /// for Avro and is ignored for JSON.
    pub fn new(
        format: SerializationFormat,
        schema_id: Option<u32>,
        max_message_bytes: usize,
    ) -> Result<Self, SerializationError> {
        Ok(match format {
            SerializationFormat::Json => Serializer::Json(JsonEncoder::new(max_message_bytes)),
            SerializationFormat::Avro => {
                Serializer::Avro(AvroEncoder::new(schema_id, max_message_bytes)?)
            }
        })
    }

    pub fn format(&self) -> SerializationFormat {
        match self {
            Serializer::Json(_) => SerializationFormat::Json,
            Serializer::Avro(_) => SerializationFormat::Avro,
        }
    }
}

impl RecordEncoder for Serializer {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, SerializationError> {
        match self {
            Serializer::Json(enc) => enc.encode(record),
            Serializer::Avro(enc) => enc.encode(record),
        }
    }
}

fn check_size(bytes: Vec<u8>, limit: usize) -> Result<Vec<u8>, SerializationError> {
    if bytes.len() > limit {
        return Err(SerializationError::TooLarge {
            size: bytes.len(),
            limit,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::record::{LabelSet, Record, METRIC_NAME_LABEL};

    pub fn record(name: &str, labels: &[(&str, &str)], ts: i64, value: f64) -> Record {
        let mut set = LabelSet::new();
        set.insert(METRIC_NAME_LABEL.to_string(), name.to_string());
        for (k, v) in labels {
            set.insert(k.to_string(), v.to_string());
        }
        Record::new(Arc::from(name), Arc::new(set), ts, value)
    }
}
