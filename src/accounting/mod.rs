//! Connection Accounting
//!
//! Sessions report connect/close events through a cloneable handle. A single
//! consumer task owns the counters and renders them to every sink.

pub mod metrics;
pub mod service;
pub mod sinks;
pub mod types;

pub use metrics::RelayMetrics;
pub use service::{AccountingHandle, AccountingService};
pub use sinks::{ConsoleSink, CounterSink, LogSink, PrometheusSink};
pub use types::{ConnectionCounts, ConnectionEvent};
