// Publisher counters and the delivery-report side channel.
//
// Delivery outcomes only move counters and produce logs. They never reach a
// request that has already been answered.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::client::ClientError;

#[derive(Debug, Default)]
pub struct PublisherStats {
    accepted: AtomicU64,
    saturated: AtomicU64,
    client_errors: AtomicU64,
    delivered: AtomicU64,
    delivery_failures: AtomicU64,
}

impl PublisherStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        counter!("prom2kafka.publisher.accepted", 1);
    }

    pub(crate) fn record_saturated(&self) {
        self.saturated.fetch_add(1, Ordering::Relaxed);
        counter!("prom2kafka.publisher.saturated", 1);
    }

    pub(crate) fn record_client_error(&self) {
        self.client_errors.fetch_add(1, Ordering::Relaxed);
        counter!("prom2kafka.publisher.client_errors", 1);
    }

    pub(crate) fn snapshot(&self, queued: usize, capacity: usize) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            saturated: self.saturated.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            queued,
            capacity,
        }
    }
}

/// Point-in-time copy of the publisher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub saturated: u64,
    pub client_errors: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
    /// Records admitted and not yet handed to the client.
    pub queued: usize,
    pub capacity: usize,
}

/// Receives asynchronous delivery outcomes from a [`crate::LogClient`].
#[derive(Debug, Clone)]
pub struct DeliveryReporter {
    stats: Arc<PublisherStats>,
    unknown_topics: Arc<RwLock<HashSet<String>>>,
}

impl DeliveryReporter {
    pub(crate) fn new(
        stats: Arc<PublisherStats>,
        unknown_topics: Arc<RwLock<HashSet<String>>>,
    ) -> Self {
        Self {
            stats,
            unknown_topics,
        }
    }

    pub fn delivered(&self, topic: &str, count: usize) {
        if count == 0 {
            return;
        }
        self.stats
            .delivered
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("prom2kafka.publisher.delivered", count as u64);
        debug!(topic, count, "Delivered records");
    }

    pub fn failed(&self, topic: &str, count: usize, err: &ClientError) {
        if count == 0 {
            return;
        }
        self.stats
            .delivery_failures
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("prom2kafka.publisher.delivery_failures", count as u64);

        if let ClientError::UnknownTopic(_) = err {
            if self.unknown_topics.write().insert(topic.to_string()) {
                warn!(topic, "Log reported unknown topic; rejecting further records for it");
            }
        }
        error!(topic, count, error = %err, "Failed to deliver records");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_updates_counters() {
        let stats = Arc::new(PublisherStats::default());
        let unknown = Arc::new(RwLock::new(HashSet::new()));
        let reporter = DeliveryReporter::new(stats.clone(), unknown.clone());

        reporter.delivered("metrics", 3);
        reporter.failed(
            "metrics",
            2,
            &ClientError::Transport("connection reset".into()),
        );
        reporter.failed("gone", 1, &ClientError::UnknownTopic("gone".into()));
        reporter.delivered("metrics", 0);

        let snap = stats.snapshot(0, 10);
        assert_eq!(snap.delivered, 3);
        assert_eq!(snap.delivery_failures, 3);
        assert!(unknown.read().contains("gone"));
        assert!(!unknown.read().contains("metrics"));
    }
}
