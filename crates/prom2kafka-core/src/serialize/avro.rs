// Avro binary encoding against the fixed `io.prometheus.Metric` schema.
//
// Framing:
//   schema id configured -> 0x00 | id (u32 BE) | datum      (Confluent wire format)
//   otherwise            -> 0xC3 0x01 | fingerprint (8B)  | datum (Avro single-object)

use std::collections::HashMap;

use apache_avro::rabin::Rabin;
use apache_avro::types::Value;
use apache_avro::Schema;

use super::{check_size, RecordEncoder, SerializationError};
use crate::record::Record;

pub const METRIC_SCHEMA_NAME: &str = "io.prometheus.Metric";

/// Version 1 of the metric schema. Changing fields requires a new name or
/// registry id; consumers resolve by fingerprint.
pub const METRIC_SCHEMA: &str = r#"{
  "type": "record",
  "name": "Metric",
  "namespace": "io.prometheus",
  "doc": "One Prometheus sample. Version 1.",
  "fields": [
    {"name": "timestamp", "type": {"type": "long", "logicalType": "timestamp-millis"}},
    {"name": "value", "type": "double"},
    {"name": "name", "type": "string"},
    {"name": "labels", "type": {"type": "map", "values": "string"}},
    {"name": "type", "type": ["null", "string"], "default": null},
    {"name": "help", "type": ["null", "string"], "default": null},
    {"name": "unit", "type": ["null", "string"], "default": null}
  ]
}"#;

const CONFLUENT_MAGIC: u8 = 0x00;
const SINGLE_OBJECT_MAGIC: [u8; 2] = [0xC3, 0x01];

#[derive(Debug, Clone)]
pub struct AvroEncoder {
    schema: Schema,
    header: Vec<u8>,
    max_message_bytes: usize,
}

impl AvroEncoder {
    pub fn new(schema_id: Option<u32>, max_message_bytes: usize) -> Result<Self, SerializationError> {
        let schema = Schema::parse_str(METRIC_SCHEMA)
            .map_err(|e| SerializationError::Avro(format!("invalid metric schema: {e}")))?;

        let header = match schema_id {
            Some(id) => {
                let mut h = Vec::with_capacity(5);
                h.push(CONFLUENT_MAGIC);
                h.extend_from_slice(&id.to_be_bytes());
                h
            }
            None => {
                let mut h = Vec::with_capacity(10);
                h.extend_from_slice(&SINGLE_OBJECT_MAGIC);
                h.extend_from_slice(&schema.fingerprint::<Rabin>().bytes);
                h
            }
        };

        Ok(Self {
            schema,
            header,
            max_message_bytes,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Bytes prepended to every datum.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    fn to_value(record: &Record) -> Value {
        let labels: HashMap<String, Value> = record
            .labels()
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let meta = record.metadata();

        Value::Record(vec![
            ("timestamp".into(), Value::TimestampMillis(record.timestamp_ms())),
            ("value".into(), Value::Double(record.value())),
            ("name".into(), Value::String(record.name().to_string())),
            ("labels".into(), Value::Map(labels)),
            ("type".into(), nullable(meta.and_then(|m| m.metric_type.as_deref()))),
            ("help".into(), nullable(meta.and_then(|m| m.help.as_deref()))),
            ("unit".into(), nullable(meta.and_then(|m| m.unit.as_deref()))),
        ])
    }
}

fn nullable(v: Option<&str>) -> Value {
    match v {
        Some(s) => Value::Union(1, Box::new(Value::String(s.to_string()))),
        None => Value::Union(0, Box::new(Value::Null)),
    }
}

impl RecordEncoder for AvroEncoder {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, SerializationError> {
        let datum = apache_avro::to_avro_datum(&self.schema, Self::to_value(record))
            .map_err(|e| SerializationError::Avro(e.to_string()))?;

        let mut out = Vec::with_capacity(self.header.len() + datum.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&datum);
        check_size(out, self.max_message_bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::record::MetricMetadata;
    use crate::serialize::test_support::record;
    use crate::serialize::DEFAULT_MAX_MESSAGE_BYTES;

    fn decode(encoder: &AvroEncoder, bytes: &[u8]) -> Vec<(String, Value)> {
        let mut reader = &bytes[encoder.header().len()..];
        match apache_avro::from_avro_datum(encoder.schema(), &mut reader, None).unwrap() {
            Value::Record(fields) => fields,
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_single_object_framing() {
        let encoder = AvroEncoder::new(None, DEFAULT_MAX_MESSAGE_BYTES).unwrap();
        let bytes = encoder.encode(&record("up", &[], 1_000, 1.0)).unwrap();
        assert_eq!(&bytes[..2], &SINGLE_OBJECT_MAGIC);
        assert_eq!(encoder.header().len(), 10);
        assert_eq!(
            &bytes[2..10],
            encoder.schema().fingerprint::<Rabin>().bytes.as_slice()
        );
    }

    #[test]
    fn test_confluent_framing() {
        let encoder = AvroEncoder::new(Some(42), DEFAULT_MAX_MESSAGE_BYTES).unwrap();
        let bytes = encoder.encode(&record("up", &[], 1_000, 1.0)).unwrap();
        assert_eq!(&bytes[..5], &[0x00, 0, 0, 0, 42]);
    }

    #[test]
    fn test_fields_roundtrip() {
        let encoder = AvroEncoder::new(None, DEFAULT_MAX_MESSAGE_BYTES).unwrap();
        let rec = record("node_load1", &[("instance", "host:9100")], 1_700_000_000_000, 0.5)
            .with_metadata(Some(Arc::new(MetricMetadata {
                metric_type: Some("gauge".into()),
                help: None,
                unit: None,
            })));

        let fields = decode(&encoder, &encoder.encode(&rec).unwrap());
        assert_eq!(fields[0], ("timestamp".into(), Value::TimestampMillis(1_700_000_000_000)));
        assert_eq!(fields[1], ("value".into(), Value::Double(0.5)));
        assert_eq!(fields[2], ("name".into(), Value::String("node_load1".into())));
        match &fields[3].1 {
            Value::Map(labels) => {
                assert_eq!(labels.len(), 2);
                assert_eq!(labels["instance"], Value::String("host:9100".into()));
            }
            other => panic!("expected map, got {:?}", other),
        }
        assert_eq!(
            fields[4].1,
            Value::Union(1, Box::new(Value::String("gauge".into())))
        );
        assert_eq!(fields[5].1, Value::Union(0, Box::new(Value::Null)));
    }

    #[test]
    fn test_nan_is_encodable() {
        let encoder = AvroEncoder::new(None, DEFAULT_MAX_MESSAGE_BYTES).unwrap();
        let fields = decode(
            &encoder,
            &encoder.encode(&record("temp", &[], 1, f64::NAN)).unwrap(),
        );
        match fields[1].1 {
            Value::Double(v) => assert!(v.is_nan()),
            ref other => panic!("expected double, got {:?}", other),
        }
    }
}
