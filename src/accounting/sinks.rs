//! Counter Sinks
//!
//! Observers the accounting task renders the counters to after each event.

use std::io::Write;
use std::sync::Arc;
use tracing::debug;

use super::{ConnectionCounts, ConnectionEvent, RelayMetrics};

/// Receives the counters after every processed event
pub trait CounterSink: Send {
    fn render(&mut self, event: ConnectionEvent, counts: &ConnectionCounts);
}

/// Structured log line per event
#[derive(Debug, Default)]
pub struct LogSink;

impl CounterSink for LogSink {
    fn render(&mut self, event: ConnectionEvent, counts: &ConnectionCounts) {
        debug!(
            event = ?event,
            clients = counts.clients,
            origins = counts.origins,
            dropped_events = counts.dropped_events,
            pool_idle = counts.pool_idle,
            pool_hits = counts.pool_hits,
            pool_misses = counts.pool_misses,
            "Connection counters updated"
        );
    }
}

/// Single carriage-return status line on a terminal
pub struct ConsoleSink<W: Write + Send = std::io::Stdout> {
    out: W,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> CounterSink for ConsoleSink<W> {
    fn render(&mut self, _event: ConnectionEvent, counts: &ConnectionCounts) {
        // Terminal output is best effort
        let _ = write!(self.out, "\rcurrent connected TCP: {:<6}", counts.total());
        let _ = self.out.flush();
    }
}

/// Mirrors the counters into Prometheus gauges
pub struct PrometheusSink {
    metrics: Arc<RelayMetrics>,
}

impl PrometheusSink {
    pub fn new(metrics: Arc<RelayMetrics>) -> Self {
        Self { metrics }
    }
}

impl CounterSink for PrometheusSink {
    fn render(&mut self, _event: ConnectionEvent, counts: &ConnectionCounts) {
        self.metrics.update(counts);
    }
}
