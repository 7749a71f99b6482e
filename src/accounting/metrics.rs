//! Prometheus Gauges

use prometheus::{IntGauge, Registry, TextEncoder};
use tracing::error;

use super::ConnectionCounts;
use crate::Result;

/// Prometheus view of the accounting counters
#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    clients: IntGauge,
    origins: IntGauge,
    events_processed: IntGauge,
    dropped_events: IntGauge,
    pool_idle: IntGauge,
    pool_hits: IntGauge,
    pool_misses: IntGauge,
}

impl RelayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let clients = IntGauge::new(
            "relayproxy_client_connections",
            "Number of currently connected clients",
        )?;
        let origins = IntGauge::new(
            "relayproxy_origin_connections",
            "Number of currently connected origin servers",
        )?;
        let events_processed = IntGauge::new(
            "relayproxy_accounting_events_processed",
            "Connection events processed by the accounting task",
        )?;
        let dropped_events = IntGauge::new(
            "relayproxy_accounting_events_dropped",
            "Connection events dropped because the accounting queue was full",
        )?;
        let pool_idle = IntGauge::new(
            "relayproxy_buffer_pool_idle",
            "Idle relay buffers held by the pool",
        )?;
        let pool_hits = IntGauge::new(
            "relayproxy_buffer_pool_hits",
            "Relay buffers served from the pool",
        )?;
        let pool_misses = IntGauge::new(
            "relayproxy_buffer_pool_misses",
            "Relay buffers allocated because the pool was empty",
        )?;

        registry.register(Box::new(clients.clone()))?;
        registry.register(Box::new(origins.clone()))?;
        registry.register(Box::new(events_processed.clone()))?;
        registry.register(Box::new(dropped_events.clone()))?;
        registry.register(Box::new(pool_idle.clone()))?;
        registry.register(Box::new(pool_hits.clone()))?;
        registry.register(Box::new(pool_misses.clone()))?;

        Ok(Self {
            registry,
            clients,
            origins,
            events_processed,
            dropped_events,
            pool_idle,
            pool_hits,
            pool_misses,
        })
    }

    pub fn update(&self, counts: &ConnectionCounts) {
        self.clients.set(counts.clients as i64);
        self.origins.set(counts.origins as i64);
        self.events_processed.set(counts.events_processed as i64);
        self.dropped_events.set(counts.dropped_events as i64);
        self.pool_idle.set(counts.pool_idle as i64);
        self.pool_hits.set(counts.pool_hits as i64);
        self.pool_misses.set(counts.pool_misses as i64);
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "Failed to encode Prometheus metrics");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_reflects_counts() {
        let metrics = RelayMetrics::new().unwrap();
        metrics.update(&ConnectionCounts {
            clients: 3,
            origins: 2,
            ..Default::default()
        });

        let text = metrics.export_prometheus();
        assert!(text.contains("relayproxy_client_connections 3"));
        assert!(text.contains("relayproxy_origin_connections 2"));
    }

    #[test]
    fn test_export_includes_pool_usage() {
        let metrics = RelayMetrics::new().unwrap();
        metrics.update(&ConnectionCounts {
            pool_idle: 5,
            pool_hits: 40,
            pool_misses: 7,
            ..Default::default()
        });

        let text = metrics.export_prometheus();
        assert!(text.contains("relayproxy_buffer_pool_idle 5"));
        assert!(text.contains("relayproxy_buffer_pool_hits 40"));
        assert!(text.contains("relayproxy_buffer_pool_misses 7"));
    }
}
