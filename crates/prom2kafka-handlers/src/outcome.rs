use metrics::counter;
use prom2kafka_config::PartialFailureStatus;
use prom2kafka_core::SkippedSamples;

/// Per-request aggregate of what happened to the input samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Records produced by the transformer.
    pub records: usize,
    pub accepted: usize,
    /// Records rejected because the handoff queue was full.
    pub saturated: usize,
    pub serialization_failures: usize,
    pub skipped: SkippedSamples,
}

impl PublishOutcome {
    pub(crate) fn new(records: usize, skipped: SkippedSamples) -> Self {
        Self {
            records,
            skipped,
            ..Default::default()
        }
    }

    /// True when every record produced was admitted or failed to serialize.
    /// Skips never make a request partial: a retry would skip them again.
    pub fn is_complete(&self) -> bool {
        self.saturated == 0
    }

    /// HTTP status for this outcome.
    pub fn status_code(&self, partial: PartialFailureStatus) -> u16 {
        if self.is_complete() {
            return 200;
        }
        match partial {
            PartialFailureStatus::ServiceUnavailable => 503,
            PartialFailureStatus::PartialContent => 206,
        }
    }
}

/// Log and count everything in `outcome` that did not reach the publisher.
/// Uses warn level so losses are visible in production logs.
pub fn report_outcome(outcome: &PublishOutcome) {
    let skipped = &outcome.skipped;
    if skipped.has_skipped() {
        tracing::warn!(
            invalid_series = skipped.invalid_series,
            invalid_series_samples = skipped.invalid_series_samples,
            empty_label_names = skipped.empty_label_names,
            nan_values = skipped.nan_values,
            infinity_values = skipped.infinity_values,
            histograms = skipped.histograms,
            total = skipped.total(),
            "Skipped invalid or unsupported samples"
        );
        counter!("prom2kafka.samples.skipped", skipped.total() as u64);
        counter!("prom2kafka.series.invalid", skipped.invalid_series as u64);
    }
    if outcome.serialization_failures > 0 {
        counter!(
            "prom2kafka.records.serialization_failures",
            outcome.serialization_failures as u64
        );
    }
    if outcome.saturated > 0 {
        tracing::warn!(
            accepted = outcome.accepted,
            saturated = outcome.saturated,
            "Publisher saturated; rejected records for this request"
        );
    }
    counter!("prom2kafka.records.produced", outcome.records as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let mut outcome = PublishOutcome::new(10, SkippedSamples::default());
        outcome.accepted = 9;
        outcome.serialization_failures = 1;
        outcome.skipped.nan_values = 4;
        assert!(outcome.is_complete());
        assert_eq!(outcome.status_code(PartialFailureStatus::ServiceUnavailable), 200);

        outcome.accepted = 8;
        outcome.saturated = 1;
        assert!(!outcome.is_complete());
        assert_eq!(outcome.status_code(PartialFailureStatus::ServiceUnavailable), 503);
        assert_eq!(outcome.status_code(PartialFailureStatus::PartialContent), 206);
    }
}
