//! Accounting Types

use serde::{Deserialize, Serialize};

use crate::pool::PoolStats;

/// Lifecycle event submitted by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ClientConnect,
    ClientClose,
    OriginConnect,
    OriginClose,
}

/// Snapshot published after every processed event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCounts {
    pub clients: u64,
    pub origins: u64,
    pub events_processed: u64,
    pub dropped_events: u64,
    pub pool_idle: usize,
    pub pool_capacity: usize,
    pub pool_hits: usize,
    pub pool_misses: usize,
    pub buffer_size: usize,
}

impl ConnectionCounts {
    /// Active TCP connections on both sides of the proxy
    pub fn total(&self) -> u64 {
        self.clients + self.origins
    }

    /// Apply one event. Counters saturate at zero since a dropped connect
    /// event can precede its close.
    pub fn apply(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::ClientConnect => self.clients += 1,
            ConnectionEvent::ClientClose => self.clients = self.clients.saturating_sub(1),
            ConnectionEvent::OriginConnect => self.origins += 1,
            ConnectionEvent::OriginClose => self.origins = self.origins.saturating_sub(1),
        }
        self.events_processed += 1;
    }

    /// Copy the pool's usage counters into the snapshot
    pub fn record_pool(&mut self, stats: PoolStats) {
        self.pool_idle = stats.idle;
        self.pool_capacity = stats.capacity;
        self.pool_hits = stats.hits;
        self.pool_misses = stats.misses;
    }
}
