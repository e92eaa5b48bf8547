// In-process log client. Keeps every delivered payload in memory; used by
// tests and local dry runs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use prom2kafka_core::SerializedPayload;
use tokio::sync::watch;

use crate::client::{group_by_topic, ClientError, LogClient};
use crate::stats::DeliveryReporter;

#[derive(Clone)]
pub struct MemoryClient {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    records: Mutex<Vec<SerializedPayload>>,
    rejected_topics: Mutex<HashSet<String>>,
    paused: watch::Sender<bool>,
    batches: AtomicUsize,
    flushed: AtomicBool,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(MemoryInner {
                records: Mutex::new(Vec::new()),
                rejected_topics: Mutex::new(HashSet::new()),
                paused,
                batches: AtomicUsize::new(0),
                flushed: AtomicBool::new(false),
            }),
        }
    }

    /// Block `send_batch` until [`MemoryClient::resume`] is called.
    pub fn pause(&self) {
        self.inner.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.inner.paused.send_replace(false);
    }

    /// Report every later record for `topic` as an unknown-topic failure.
    pub fn reject_topic(&self, topic: &str) {
        self.inner.rejected_topics.lock().insert(topic.to_string());
    }

    /// Payloads delivered so far, in delivery order.
    pub fn records(&self) -> Vec<SerializedPayload> {
        self.inner.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `send_batch` calls.
    pub fn batches(&self) -> usize {
        self.inner.batches.load(Ordering::Relaxed)
    }

    pub fn flushed(&self) -> bool {
        self.inner.flushed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogClient for MemoryClient {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send_batch(&self, batch: Vec<SerializedPayload>, reporter: &DeliveryReporter) {
        let mut gate = self.inner.paused.subscribe();
        // Sender lives in `inner`, so the channel cannot close here.
        let _ = gate.wait_for(|paused| !*paused).await;

        self.inner.batches.fetch_add(1, Ordering::Relaxed);
        for (topic, items) in group_by_topic(batch) {
            if self.inner.rejected_topics.lock().contains(&topic) {
                reporter.failed(&topic, items.len(), &ClientError::UnknownTopic(topic.clone()));
                continue;
            }
            let count = items.len();
            self.inner.records.lock().extend(items);
            reporter.delivered(&topic, count);
        }
    }

    async fn flush(&self) -> Result<(), ClientError> {
        self.inner.flushed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
