//! Status Endpoint
//!
//! Optional HTTP surface exposing health, the live connection counters and
//! Prometheus metrics.

pub mod handlers;
pub mod server;

pub use handlers::{AppState, StatusReport};
pub use server::StatusServer;
