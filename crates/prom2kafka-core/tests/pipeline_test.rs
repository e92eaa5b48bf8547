// Integration tests for prom2kafka-core
//
// Tests the complete pure workflow from remote-write bytes to routed payloads

use std::collections::HashMap;

use chrono::DateTime;
use prom2kafka_core::{
    decode, expand, DecodeError, NonFinitePolicy, PartitionKeyPolicy, RecordEncoder, Router,
    SerializationFormat, SerializedPayload, Serializer, TopicStrategy, DEFAULT_MAX_MESSAGE_BYTES,
};
use prom2kafka_proto::{Label, Sample, TimeSeries, WriteRequest};
use prost::Message;

fn label(name: &str, value: &str) -> Label {
    Label {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Snappy-compressed remote-write request with one series.
fn create_request(labels: Vec<Label>, samples: Vec<(i64, f64)>) -> Vec<u8> {
    let request = WriteRequest {
        timeseries: vec![TimeSeries {
            labels,
            samples: samples
                .into_iter()
                .map(|(timestamp, value)| Sample { value, timestamp })
                .collect(),
            ..Default::default()
        }],
        metadata: vec![],
    };
    snap::raw::Encoder::new()
        .compress_vec(&request.encode_to_vec())
        .expect("compress")
}

fn run(
    raw: &[u8],
    policy: NonFinitePolicy,
    serializer: &Serializer,
    router: &Router,
) -> Result<Vec<SerializedPayload>, DecodeError> {
    let batch = decode(raw)?;
    let expansion = expand(batch, policy);
    Ok(expansion
        .records
        .iter()
        .filter_map(|record| {
            let bytes = serializer.encode(record).ok()?;
            Some(SerializedPayload::new(
                router.route(record),
                router.partition_key(record).map(str::to_string),
                bytes,
            ))
        })
        .collect())
}

#[test]
fn test_single_sample_yields_one_routed_payload() {
    let raw = create_request(
        vec![label("__name__", "up"), label("job", "node"), label("instance", "host:9100")],
        vec![(1_705_327_800_000, 1.0)], // 2024-01-15 14:30:00 UTC
    );
    let serializer =
        Serializer::new(SerializationFormat::Json, None, DEFAULT_MAX_MESSAGE_BYTES).unwrap();

    let payloads = run(&raw, NonFinitePolicy::Drop, &serializer, &Router::default());
    assert!(payloads.is_ok(), "pipeline failed: {:?}", payloads.err());

    let payloads = payloads.unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(&*payloads[0].topic, "metrics");
    assert_eq!(payloads[0].key.as_deref(), Some("up"));
}

#[test]
fn test_json_roundtrip_with_independent_reader() {
    let raw = create_request(
        vec![label("__name__", "node_load1"), label("instance", "host:9100")],
        vec![(1_705_327_800_250, 0.75)],
    );
    let serializer =
        Serializer::new(SerializationFormat::Json, None, DEFAULT_MAX_MESSAGE_BYTES).unwrap();
    let payloads = run(&raw, NonFinitePolicy::Drop, &serializer, &Router::default()).unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&payloads[0].bytes).unwrap();
    assert_eq!(doc["name"], "node_load1");

    let labels: HashMap<String, String> = serde_json::from_value(doc["labels"].clone()).unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels["__name__"], "node_load1");
    assert_eq!(labels["instance"], "host:9100");

    let ts = DateTime::parse_from_rfc3339(doc["timestamp"].as_str().unwrap()).unwrap();
    assert_eq!(ts.timestamp_millis(), 1_705_327_800_250);

    let value: f64 = doc["value"].as_str().unwrap().parse().unwrap();
    assert_eq!(value, 0.75);
}

#[test]
fn test_n_samples_produce_n_payloads_in_order() {
    let samples: Vec<(i64, f64)> = (1..=5).map(|i| (i * 1000, i as f64)).collect();
    let raw = create_request(vec![label("__name__", "requests_total")], samples);
    let serializer =
        Serializer::new(SerializationFormat::Json, None, DEFAULT_MAX_MESSAGE_BYTES).unwrap();
    let router = Router::new(
        TopicStrategy::PerMetric {
            template: "prom-{metric}".into(),
        },
        HashMap::new(),
        PartitionKeyPolicy::MetricName,
    );

    let payloads = run(&raw, NonFinitePolicy::Drop, &serializer, &router).unwrap();
    assert_eq!(payloads.len(), 5);
    for (i, payload) in payloads.iter().enumerate() {
        assert_eq!(&*payload.topic, "prom-requests_total");
        let doc: serde_json::Value = serde_json::from_slice(&payload.bytes).unwrap();
        assert_eq!(doc["value"], (i + 1).to_string());
    }
}

#[test]
fn test_corrupt_input_produces_nothing() {
    let serializer =
        Serializer::new(SerializationFormat::Avro, None, DEFAULT_MAX_MESSAGE_BYTES).unwrap();
    let result = run(
        b"not snappy at all \xff\xfe",
        NonFinitePolicy::Drop,
        &serializer,
        &Router::default(),
    );
    assert!(matches!(result, Err(DecodeError::Decompression(_))), "{:?}", result);
}

#[test]
fn test_nan_policy_with_avro() {
    let raw = create_request(
        vec![label("__name__", "temperature")],
        vec![(1_000, f64::NAN), (2_000, 21.5)],
    );
    let serializer =
        Serializer::new(SerializationFormat::Avro, Some(7), DEFAULT_MAX_MESSAGE_BYTES).unwrap();
    let router = Router::default();

    let dropped = run(&raw, NonFinitePolicy::Drop, &serializer, &router).unwrap();
    assert_eq!(dropped.len(), 1);

    let forwarded = run(&raw, NonFinitePolicy::Forward, &serializer, &router).unwrap();
    assert_eq!(forwarded.len(), 2);
    assert_eq!(&forwarded[0].bytes[..5], &[0x00, 0, 0, 0, 7]);
}
