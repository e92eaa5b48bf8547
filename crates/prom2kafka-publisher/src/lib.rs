// prom2kafka-publisher - Bounded handoff to the log client
//
// Request tasks call `Publisher::publish`; a single worker task drains the
// handoff queue in FIFO order and feeds the `LogClient`.
//
//   request task --permit + try_send--> [bounded mpsc] --recv_many--> worker --> LogClient
//
// Capacity is a semaphore. A permit is taken at admission and released once
// the worker has handed the payload to the client, so at most
// `queue_capacity` records are buffered between requests and the client.
// Admission waits at most `admission_timeout`; a timeout is reported as
// saturation, never as an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use prom2kafka_core::{validate_topic, SerializedPayload};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

mod client;
#[cfg(feature = "kafka")]
mod kafka;
mod memory;
mod rest;
mod stats;

pub use client::{ClientError, LogClient};
#[cfg(feature = "kafka")]
pub use kafka::KafkaClient;
pub use memory::MemoryClient;
pub use rest::RestProxyClient;
pub use stats::{DeliveryReporter, PublisherStats, StatsSnapshot};

/// Why a record was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The handoff queue stayed full for the whole admission window.
    Saturated,
    /// The destination is unusable or the worker has stopped.
    ClientError(String),
}

/// Result of one admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(Rejection),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PublisherOptions {
    pub queue_capacity: usize,
    pub admission_timeout: Duration,
    pub max_batch: usize,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            admission_timeout: Duration::from_millis(100),
            max_batch: 500,
        }
    }
}

struct Envelope {
    payload: SerializedPayload,
    permit: OwnedSemaphorePermit,
}

/// Cloneable admission handle. The worker exits once every clone is dropped
/// and the queue has drained.
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Envelope>,
    permits: Arc<Semaphore>,
    capacity: usize,
    admission_timeout: Duration,
    stats: Arc<PublisherStats>,
    unknown_topics: Arc<RwLock<HashSet<String>>>,
    backend: &'static str,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("backend", &self.backend)
            .field("capacity", &self.capacity)
            .field("admission_timeout", &self.admission_timeout)
            .finish()
    }
}

impl Publisher {
    /// Spawn the publishing worker on the current tokio runtime.
    ///
    /// The returned handle completes after the queue has drained and the
    /// client has been flushed.
    pub fn start<C: LogClient>(client: C, options: PublisherOptions) -> (Publisher, JoinHandle<()>) {
        let capacity = options.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let stats = Arc::new(PublisherStats::default());
        let unknown_topics = Arc::new(RwLock::new(HashSet::new()));
        let backend = client.name();

        let worker = Worker {
            rx,
            client,
            max_batch: options.max_batch.max(1),
            reporter: DeliveryReporter::new(stats.clone(), unknown_topics.clone()),
        };
        let handle = tokio::spawn(worker.run());

        info!(
            backend,
            capacity,
            admission_timeout_ms = options.admission_timeout.as_millis() as u64,
            "Publisher started"
        );

        let publisher = Publisher {
            tx,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            admission_timeout: options.admission_timeout,
            stats,
            unknown_topics,
            backend,
        };
        (publisher, handle)
    }

    /// Admit `payload`, waiting up to the admission timeout for queue space.
    pub async fn publish(&self, payload: SerializedPayload) -> Admission {
        if let Some(rejected) = self.check_destination(&payload) {
            return rejected;
        }

        let acquire = self.permits.clone().acquire_owned();
        match tokio::time::timeout(self.admission_timeout, acquire).await {
            Ok(Ok(permit)) => self.enqueue(payload, permit),
            Ok(Err(_)) => self.client_error("publisher is closed".to_string()),
            Err(_) => self.saturated(),
        }
    }

    /// Admit `payload` only if queue space is available right now.
    pub fn try_publish(&self, payload: SerializedPayload) -> Admission {
        if let Some(rejected) = self.check_destination(&payload) {
            return rejected;
        }

        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => self.enqueue(payload, permit),
            Err(TryAcquireError::NoPermits) => self.saturated(),
            Err(TryAcquireError::Closed) => self.client_error("publisher is closed".to_string()),
        }
    }

    /// False once the worker task has exited.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn stats(&self) -> StatsSnapshot {
        let queued = self.capacity - self.permits.available_permits();
        self.stats.snapshot(queued, self.capacity)
    }

    fn check_destination(&self, payload: &SerializedPayload) -> Option<Admission> {
        if let Err(e) = validate_topic(&payload.topic) {
            return Some(self.client_error(e));
        }
        if self.unknown_topics.read().contains(&*payload.topic) {
            return Some(self.client_error(format!(
                "topic '{}' was reported unknown by the log",
                payload.topic
            )));
        }
        None
    }

    fn enqueue(&self, payload: SerializedPayload, permit: OwnedSemaphorePermit) -> Admission {
        match self.tx.try_send(Envelope { payload, permit }) {
            Ok(()) => {
                self.stats.record_accepted();
                Admission::Accepted
            }
            // Unreachable while the channel is sized to the permit count.
            Err(TrySendError::Full(_)) => self.saturated(),
            Err(TrySendError::Closed(_)) => {
                self.client_error("publisher worker has stopped".to_string())
            }
        }
    }

    fn saturated(&self) -> Admission {
        self.stats.record_saturated();
        Admission::Rejected(Rejection::Saturated)
    }

    fn client_error(&self, message: String) -> Admission {
        self.stats.record_client_error();
        Admission::Rejected(Rejection::ClientError(message))
    }
}

struct Worker<C> {
    rx: mpsc::Receiver<Envelope>,
    client: C,
    max_batch: usize,
    reporter: DeliveryReporter,
}

impl<C: LogClient> Worker<C> {
    async fn run(mut self) {
        debug!(backend = self.client.name(), "Publisher worker started");

        let mut buf = Vec::with_capacity(self.max_batch);
        while self.rx.recv_many(&mut buf, self.max_batch).await > 0 {
            let (payloads, permits): (Vec<_>, Vec<_>) =
                buf.drain(..).map(|e| (e.payload, e.permit)).unzip();
            self.client.send_batch(payloads, &self.reporter).await;
            drop(permits);
        }

        if let Err(e) = self.client.flush().await {
            warn!(backend = self.client.name(), error = %e, "Failed to flush log client");
        }
        debug!(backend = self.client.name(), "Publisher worker stopped");
    }
}
