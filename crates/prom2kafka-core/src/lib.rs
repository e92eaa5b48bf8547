// prom2kafka-core - Platform-agnostic pipeline logic
//
// This crate contains the PURE processing stages for turning a Prometheus
// remote-write request into routed, encoded records. No I/O, no async, no
// runtime dependencies.
//
// raw bytes -> decode -> expand -> encode -> route
//
// Publishing and HTTP live in outer crates; everything here is a function of
// its inputs and the configuration passed at construction.

pub mod decode;
pub mod record;
pub mod route;
pub mod serialize;
pub mod transform;

// Re-export commonly used types
pub use decode::{decode, decode_with_limits, DecodeError, DecodeLimits, DecodedBatch};
pub use record::{LabelSet, MetricMetadata, Record, SerializedPayload, METRIC_NAME_LABEL};
pub use route::{validate_topic, PartitionKeyPolicy, Router, TopicStrategy};
pub use serialize::{
    RecordEncoder, SerializationError, SerializationFormat, Serializer, DEFAULT_MAX_MESSAGE_BYTES,
};
pub use transform::{
    expand, Expansion, LabelValidationError, NonFinitePolicy, SkippedSamples, Transformer,
};
