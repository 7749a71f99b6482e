//! Accounting Service

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{ConnectionCounts, ConnectionEvent, CounterSink};
use crate::pool::BufferPool;

/// Cloneable submission side held by sessions
#[derive(Debug, Clone)]
pub struct AccountingHandle {
    tx: mpsc::Sender<ConnectionEvent>,
    dropped: Arc<AtomicU64>,
}

impl AccountingHandle {
    /// Submit an event without waiting. A full queue drops the event.
    pub fn submit(&self, event: ConnectionEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(event = ?event, "Accounting queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owns the counters; the only place they are mutated
pub struct AccountingService {
    rx: mpsc::Receiver<ConnectionEvent>,
    dropped: Arc<AtomicU64>,
    pool: Arc<BufferPool>,
    sinks: Vec<Box<dyn CounterSink>>,
    snapshot: watch::Sender<ConnectionCounts>,
    counts: ConnectionCounts,
}

impl AccountingService {
    /// Create the service with a queue of `capacity` events
    pub fn new(capacity: usize, pool: Arc<BufferPool>) -> (Self, AccountingHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let mut counts = ConnectionCounts {
            buffer_size: pool.buffer_size(),
            ..Default::default()
        };
        counts.record_pool(pool.stats());
        let (snapshot, _) = watch::channel(counts);

        let service = Self {
            rx,
            dropped: dropped.clone(),
            pool,
            sinks: Vec::new(),
            snapshot,
            counts,
        };
        (service, AccountingHandle { tx, dropped })
    }

    pub fn with_sink<S: CounterSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Latest counters, updated after every event
    pub fn subscribe(&self) -> watch::Receiver<ConnectionCounts> {
        self.snapshot.subscribe()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consume events until every handle is dropped
    pub async fn run(mut self) {
        debug!("Accounting task started");
        while let Some(event) = self.rx.recv().await {
            self.counts.apply(event);
            self.counts.dropped_events = self.dropped.load(Ordering::Relaxed);
            self.counts.record_pool(self.pool.stats());

            for sink in self.sinks.iter_mut() {
                sink.render(event, &self.counts);
            }
            self.snapshot.send_replace(self.counts);
        }
        debug!("Accounting task stopped");
    }
}
