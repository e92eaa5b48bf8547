// Remote-write decoder
//
// snappy (block format) -> prometheus.WriteRequest -> DecodedBatch.
// Decoding is all-or-nothing: any failure rejects the whole request and no
// series are returned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use prom2kafka_proto::prometheus::metric_metadata::MetricType;
use prom2kafka_proto::WriteRequest;
use prost::Message;

use crate::record::MetricMetadata;

/// Upper bound for the decompressed envelope when none is configured.
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 32 * 1024 * 1024;

/// Batch-fatal decode failures.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decompress snappy payload: {0}")]
    Decompression(String),

    #[error("malformed remote-write envelope: {0}")]
    MalformedEnvelope(String),
}

impl DecodeError {
    fn malformed(msg: impl Into<String>) -> Self {
        DecodeError::MalformedEnvelope(msg.into())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_decompressed_bytes: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_decompressed_bytes: DEFAULT_MAX_DECOMPRESSED_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// One decoded series. Label names are unique; labels keep wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub labels: Vec<(String, String)>,
    pub samples: Vec<SamplePoint>,
    /// Native histogram samples present on the wire. Not expanded.
    pub histograms: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    pub series: Vec<TimeSeries>,
    /// Metric family name -> metadata.
    pub metadata: HashMap<String, Arc<MetricMetadata>>,
}

impl DecodedBatch {
    pub fn sample_count(&self) -> usize {
        self.series.iter().map(|s| s.samples.len()).sum()
    }
}

/// Decode with the default limits.
pub fn decode(raw: &[u8]) -> Result<DecodedBatch, DecodeError> {
    decode_with_limits(raw, &DecodeLimits::default())
}

pub fn decode_with_limits(raw: &[u8], limits: &DecodeLimits) -> Result<DecodedBatch, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::malformed("empty request body"));
    }

    let decompressed = decompress(raw, limits)?;
    let request = WriteRequest::decode(decompressed.as_slice())
        .map_err(|e| DecodeError::malformed(format!("invalid WriteRequest protobuf: {}", e)))?;

    if request.timeseries.is_empty() {
        return Err(DecodeError::malformed("write request contains no series"));
    }

    let mut series = Vec::with_capacity(request.timeseries.len());
    for (idx, ts) in request.timeseries.into_iter().enumerate() {
        series.push(convert_series(idx, ts)?);
    }

    let metadata = request
        .metadata
        .into_iter()
        .filter(|m| !m.metric_family_name.is_empty())
        .map(|m| {
            let metric_type = MetricType::try_from(m.r#type)
                .ok()
                .filter(|t| *t != MetricType::Unknown)
                .map(|t| t.as_str().to_string());
            let meta = MetricMetadata {
                metric_type,
                help: non_empty(m.help),
                unit: non_empty(m.unit),
            };
            (m.metric_family_name, Arc::new(meta))
        })
        .collect();

    Ok(DecodedBatch { series, metadata })
}

fn decompress(raw: &[u8], limits: &DecodeLimits) -> Result<Vec<u8>, DecodeError> {
    let len = snap::raw::decompress_len(raw)
        .map_err(|e| DecodeError::Decompression(e.to_string()))?;
    if len > limits.max_decompressed_bytes {
        return Err(DecodeError::Decompression(format!(
            "decompressed size {} exceeds limit of {} bytes",
            len, limits.max_decompressed_bytes
        )));
    }

    snap::raw::Decoder::new()
        .decompress_vec(raw)
        .map_err(|e| DecodeError::Decompression(e.to_string()))
}

fn convert_series(
    idx: usize,
    ts: prom2kafka_proto::TimeSeries,
) -> Result<TimeSeries, DecodeError> {
    if ts.labels.is_empty() {
        return Err(DecodeError::malformed(format!("series {} has no labels", idx)));
    }

    let mut seen = HashSet::with_capacity(ts.labels.len());
    for label in &ts.labels {
        if !seen.insert(label.name.as_str()) {
            return Err(DecodeError::malformed(format!(
                "series {} has duplicate label '{}'",
                idx, label.name
            )));
        }
    }

    // proto3 cannot tell an absent int64 from zero.
    if ts.samples.iter().any(|s| s.timestamp == 0) {
        return Err(DecodeError::malformed(format!(
            "series {} has a sample without timestamp",
            idx
        )));
    }

    Ok(TimeSeries {
        labels: ts.labels.into_iter().map(|l| (l.name, l.value)).collect(),
        samples: ts
            .samples
            .into_iter()
            .map(|s| SamplePoint {
                timestamp_ms: s.timestamp,
                value: s.value,
            })
            .collect(),
        histograms: ts.histograms.len(),
    })
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
