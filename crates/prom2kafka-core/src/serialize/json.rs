// JSON text encoding
//
// {"timestamp":"2023-11-14T22:13:20.000Z","value":"1","name":"up","labels":{..}}
// Values are strings so NaN and +/-Inf stay representable.

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;

use super::{check_size, RecordEncoder, SerializationError};
use crate::record::{LabelSet, Record};

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: String,
    value: String,
    name: &'a str,
    labels: &'a LabelSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<JsonMetadata<'a>>,
}

#[derive(Serialize)]
struct JsonMetadata<'a> {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    metric_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct JsonEncoder {
    max_message_bytes: usize,
}

impl JsonEncoder {
    pub fn new(max_message_bytes: usize) -> Self {
        Self { max_message_bytes }
    }
}

impl RecordEncoder for JsonEncoder {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, SerializationError> {
        let timestamp = DateTime::from_timestamp_millis(record.timestamp_ms())
            .ok_or(SerializationError::TimestampOutOfRange(record.timestamp_ms()))?
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let metadata = record
            .metadata()
            .filter(|m| !m.is_empty())
            .map(|m| JsonMetadata {
                metric_type: m.metric_type.as_deref(),
                help: m.help.as_deref(),
                unit: m.unit.as_deref(),
            });

        let doc = JsonRecord {
            timestamp,
            value: format_value(record.value()),
            name: record.name(),
            labels: record.labels(),
            metadata,
        };

        check_size(serde_json::to_vec(&doc)?, self.max_message_bytes)
    }
}

/// Prometheus text-format spelling of a sample value.
pub(crate) fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}
