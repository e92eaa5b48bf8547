// Record model
//
// A Record is one output event: one sample of one series. Records produced
// from the same series share a single label-set allocation.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Reserved label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Label name to value mapping. Ordered so encodings are stable.
pub type LabelSet = BTreeMap<String, String>;

/// Metric family metadata carried by the remote-write `metadata` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricMetadata {
    pub metric_type: Option<String>,
    pub help: Option<String>,
    pub unit: Option<String>,
}

impl MetricMetadata {
    pub fn is_empty(&self) -> bool {
        self.metric_type.is_none() && self.help.is_none() && self.unit.is_none()
    }
}

/// One sample, immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: Arc<str>,
    labels: Arc<LabelSet>,
    timestamp_ms: i64,
    value: f64,
    metadata: Option<Arc<MetricMetadata>>,
}

impl Record {
    /// Build a record. `labels` is expected to contain `__name__ = name`; the
    /// transformer guarantees this for every record it emits.
    pub fn new(name: Arc<str>, labels: Arc<LabelSet>, timestamp_ms: i64, value: f64) -> Self {
        Self {
            name,
            labels,
            timestamp_ms,
            value,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Arc<MetricMetadata>>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Shared handle to the label set, used to check sharing across a series.
    pub fn labels_arc(&self) -> &Arc<LabelSet> {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn metadata(&self) -> Option<&MetricMetadata> {
        self.metadata.as_deref()
    }
}

/// Encoded record ready for the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedPayload {
    pub topic: Arc<str>,
    /// Partition-affinity key.
    pub key: Option<String>,
    pub bytes: Vec<u8>,
}

impl SerializedPayload {
    pub fn new(topic: Arc<str>, key: Option<String>, bytes: Vec<u8>) -> Self {
        Self { topic, key, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accessors() {
        let mut labels = LabelSet::new();
        labels.insert(METRIC_NAME_LABEL.to_string(), "up".to_string());
        labels.insert("job".to_string(), "node".to_string());
        let labels = Arc::new(labels);

        let record = Record::new(Arc::from("up"), labels.clone(), 1_000, 1.0);
        assert_eq!(record.name(), "up");
        assert_eq!(record.label("job"), Some("node"));
        assert_eq!(record.label("missing"), None);
        assert_eq!(record.timestamp_ms(), 1_000);
        assert_eq!(record.value(), 1.0);
        assert!(record.metadata().is_none());
        assert!(Arc::ptr_eq(record.labels_arc(), &labels));
    }

    #[test]
    fn test_metadata_is_empty() {
        assert!(MetricMetadata::default().is_empty());
        let meta = MetricMetadata {
            unit: Some("seconds".into()),
            ..Default::default()
        };
        assert!(!meta.is_empty());
    }
}
