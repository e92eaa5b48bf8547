// Transformer: decoded series -> one Record per sample
//
// Per-series problems (bad labels, missing metric name) skip the series and
// are counted. Nothing here is fatal to the batch.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decode::{DecodedBatch, TimeSeries};
use crate::record::{LabelSet, MetricMetadata, Record, METRIC_NAME_LABEL};

/// What to do with NaN and +/-Inf sample values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    /// Exclude the sample and count it.
    #[default]
    Drop,
    /// Emit the record with the value unchanged.
    Forward,
}

impl std::str::FromStr for NonFinitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(NonFinitePolicy::Drop),
            "forward" => Ok(NonFinitePolicy::Forward),
            other => Err(format!(
                "unknown non-finite policy '{}', expected 'drop' or 'forward'",
                other
            )),
        }
    }
}

/// Why a series was rejected by label validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelValidationError {
    #[error("series has no __name__ label")]
    MissingMetricName,

    #[error("invalid metric name '{0}'")]
    InvalidMetricName(String),

    #[error("duplicate label '{0}' after normalization")]
    DuplicateLabel(String),
}

/// Counts of input that did not become records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkippedSamples {
    /// Series rejected by label validation.
    pub invalid_series: usize,
    /// Samples belonging to rejected series.
    pub invalid_series_samples: usize,
    /// Labels dropped because their name was empty after trimming.
    pub empty_label_names: usize,
    pub nan_values: usize,
    pub infinity_values: usize,
    /// Native histogram samples, which are not expanded.
    pub histograms: usize,
}

impl SkippedSamples {
    pub fn has_skipped(&self) -> bool {
        self.total() > 0 || self.empty_label_names > 0
    }

    /// Samples that did not produce a record.
    pub fn total(&self) -> usize {
        self.invalid_series_samples + self.nan_values + self.infinity_values + self.histograms
    }

    pub fn merge(&mut self, other: &SkippedSamples) {
        self.invalid_series += other.invalid_series;
        self.invalid_series_samples += other.invalid_series_samples;
        self.empty_label_names += other.empty_label_names;
        self.nan_values += other.nan_values;
        self.infinity_values += other.infinity_values;
        self.histograms += other.histograms;
    }
}

#[derive(Debug, Default)]
pub struct Expansion {
    pub records: Vec<Record>,
    pub skipped: SkippedSamples,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer {
    policy: NonFinitePolicy,
}

impl Transformer {
    pub fn new(policy: NonFinitePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NonFinitePolicy {
        self.policy
    }

    /// Expand every series into records, preserving series and sample order.
    pub fn expand(&self, batch: DecodedBatch) -> Expansion {
        let mut out = Expansion {
            records: Vec::with_capacity(batch.sample_count()),
            skipped: SkippedSamples::default(),
        };

        for series in batch.series {
            out.skipped.histograms += series.histograms;

            let (name, labels) = match normalize_labels(&series, &mut out.skipped) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(error = %e, samples = series.samples.len(), "Skipping series");
                    out.skipped.invalid_series += 1;
                    out.skipped.invalid_series_samples += series.samples.len();
                    continue;
                }
            };
            let metadata = lookup_metadata(&batch.metadata, &name);

            for sample in &series.samples {
                if !sample.value.is_finite() && self.policy == NonFinitePolicy::Drop {
                    if sample.value.is_nan() {
                        out.skipped.nan_values += 1;
                    } else {
                        out.skipped.infinity_values += 1;
                    }
                    continue;
                }
                out.records.push(
                    Record::new(name.clone(), labels.clone(), sample.timestamp_ms, sample.value)
                        .with_metadata(metadata.clone()),
                );
            }
        }

        out
    }
}

/// Convenience wrapper around [`Transformer::expand`].
pub fn expand(batch: DecodedBatch, policy: NonFinitePolicy) -> Expansion {
    Transformer::new(policy).expand(batch)
}

fn normalize_labels(
    series: &TimeSeries,
    skipped: &mut SkippedSamples,
) -> Result<(Arc<str>, Arc<LabelSet>), LabelValidationError> {
    let mut labels = LabelSet::new();
    for (name, value) in &series.labels {
        let name = name.trim();
        if name.is_empty() {
            skipped.empty_label_names += 1;
            continue;
        }
        if labels.insert(name.to_string(), value.clone()).is_some() {
            return Err(LabelValidationError::DuplicateLabel(name.to_string()));
        }
    }

    let metric = labels
        .get(METRIC_NAME_LABEL)
        .filter(|n| !n.is_empty())
        .ok_or(LabelValidationError::MissingMetricName)?;
    if !is_valid_metric_name(metric) {
        return Err(LabelValidationError::InvalidMetricName(metric.clone()));
    }

    Ok((Arc::from(metric.as_str()), Arc::new(labels)))
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

const FAMILY_SUFFIXES: &[&str] = &["_bucket", "_count", "_sum", "_total", "_created"];

// Metadata is keyed by family name; series of counters and histograms carry
// a suffixed name.
fn lookup_metadata(
    metadata: &HashMap<String, Arc<MetricMetadata>>,
    name: &str,
) -> Option<Arc<MetricMetadata>> {
    if metadata.is_empty() {
        return None;
    }
    if let Some(meta) = metadata.get(name) {
        return Some(meta.clone());
    }
    FAMILY_SUFFIXES
        .iter()
        .filter_map(|suffix| name.strip_suffix(suffix))
        .find_map(|family| metadata.get(family).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::SamplePoint;

    fn series(labels: &[(&str, &str)], values: &[(i64, f64)]) -> TimeSeries {
        TimeSeries {
            labels: labels
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            samples: values
                .iter()
                .map(|(t, v)| SamplePoint {
                    timestamp_ms: *t,
                    value: *v,
                })
                .collect(),
            histograms: 0,
        }
    }

    fn batch(series: Vec<TimeSeries>) -> DecodedBatch {
        DecodedBatch {
            series,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_n_samples_produce_n_records_sharing_labels() {
        let input = batch(vec![series(
            &[("__name__", "cpu_seconds_total"), ("cpu", "0"), ("mode", "idle")],
            &[(1, 1.0), (2, 2.0), (3, 3.0)],
        )]);

        let out = expand(input, NonFinitePolicy::Drop);
        assert_eq!(out.records.len(), 3);
        assert!(!out.skipped.has_skipped());

        for (i, record) in out.records.iter().enumerate() {
            assert_eq!(record.name(), "cpu_seconds_total");
            assert_eq!(record.labels().len(), 3);
            assert_eq!(record.label("mode"), Some("idle"));
            assert_eq!(record.timestamp_ms(), i as i64 + 1);
            assert_eq!(record.value(), i as f64 + 1.0);
        }
        assert!(Arc::ptr_eq(
            out.records[0].labels_arc(),
            out.records[2].labels_arc()
        ));
    }

    #[test]
    fn test_missing_metric_name_skips_series_only() {
        let input = batch(vec![
            series(&[("job", "node")], &[(1, 1.0), (2, 1.0)]),
            series(&[("__name__", "up")], &[(1, 1.0)]),
        ]);

        let out = expand(input, NonFinitePolicy::Drop);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped.invalid_series, 1);
        assert_eq!(out.skipped.invalid_series_samples, 2);
        assert_eq!(out.skipped.total(), 2);
    }

    #[test]
    fn test_invalid_metric_name_skips_series() {
        let input = batch(vec![series(&[("__name__", "9lives")], &[(1, 1.0)])]);
        let out = expand(input, NonFinitePolicy::Drop);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped.invalid_series, 1);
    }

    #[test]
    fn test_label_names_are_trimmed() {
        let input = batch(vec![series(
            &[("__name__", "up"), ("  job ", "node"), ("   ", "orphan")],
            &[(1, 1.0)],
        )]);

        let out = expand(input, NonFinitePolicy::Drop);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].label("job"), Some("node"));
        assert_eq!(out.records[0].labels().len(), 2);
        assert_eq!(out.skipped.empty_label_names, 1);
        assert!(out.skipped.has_skipped());
    }

    #[test]
    fn test_trimmed_duplicate_skips_series() {
        let input = batch(vec![series(
            &[("__name__", "up"), ("job", "a"), ("job ", "b")],
            &[(1, 1.0)],
        )]);
        let out = expand(input, NonFinitePolicy::Drop);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped.invalid_series, 1);
    }

    #[test]
    fn test_nan_dropped_by_default() {
        let input = batch(vec![series(
            &[("__name__", "temp")],
            &[(1, f64::NAN), (2, f64::INFINITY), (3, f64::NEG_INFINITY), (4, 20.5)],
        )]);

        let out = Transformer::default().expand(input);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].value(), 20.5);
        assert_eq!(out.skipped.nan_values, 1);
        assert_eq!(out.skipped.infinity_values, 2);
    }

    #[test]
    fn test_nan_forwarded() {
        let input = batch(vec![series(&[("__name__", "temp")], &[(1, f64::NAN)])]);
        let out = expand(input, NonFinitePolicy::Forward);
        assert_eq!(out.records.len(), 1);
        assert!(out.records[0].value().is_nan());
        assert_eq!(out.skipped, SkippedSamples::default());
    }

    #[test]
    fn test_histograms_counted() {
        let mut s = series(&[("__name__", "latency")], &[]);
        s.histograms = 4;
        let out = expand(batch(vec![s]), NonFinitePolicy::Drop);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped.histograms, 4);
    }

    #[test]
    fn test_metadata_attached_by_family() {
        let mut input = batch(vec![
            series(&[("__name__", "http_requests_total")], &[(1, 1.0)]),
            series(&[("__name__", "latency_bucket"), ("le", "0.5")], &[(1, 1.0)]),
            series(&[("__name__", "other")], &[(1, 1.0)]),
        ]);
        input.metadata.insert(
            "http_requests".into(),
            Arc::new(MetricMetadata {
                metric_type: Some("counter".into()),
                ..Default::default()
            }),
        );
        input.metadata.insert(
            "latency".into(),
            Arc::new(MetricMetadata {
                metric_type: Some("histogram".into()),
                ..Default::default()
            }),
        );

        let out = expand(input, NonFinitePolicy::Drop);
        let types: Vec<_> = out
            .records
            .iter()
            .map(|r| r.metadata().and_then(|m| m.metric_type.clone()))
            .collect();
        assert_eq!(
            types,
            vec![Some("counter".into()), Some("histogram".into()), None]
        );
    }

    #[test]
    fn test_metric_name_validation() {
        assert!(is_valid_metric_name("up"));
        assert!(is_valid_metric_name("_x:y_1"));
        assert!(is_valid_metric_name(":recording:rule"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("1abc"));
        assert!(!is_valid_metric_name("a-b"));
        assert!(!is_valid_metric_name("a b"));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("drop".parse::<NonFinitePolicy>(), Ok(NonFinitePolicy::Drop));
        assert_eq!("Forward".parse::<NonFinitePolicy>(), Ok(NonFinitePolicy::Forward));
        assert!("keep".parse::<NonFinitePolicy>().is_err());
    }

    #[test]
    fn test_skipped_merge() {
        let mut a = SkippedSamples {
            nan_values: 1,
            ..Default::default()
        };
        let b = SkippedSamples {
            nan_values: 2,
            histograms: 3,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.nan_values, 3);
        assert_eq!(a.histograms, 3);
        assert_eq!(a.total(), 6);
    }
}
