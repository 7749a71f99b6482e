//! Status Handlers

use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::accounting::{ConnectionCounts, RelayMetrics};
use crate::config::Protocol;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub protocol: Protocol,
    pub counts: watch::Receiver<ConnectionCounts>,
    pub metrics: Arc<RelayMetrics>,
    pub start_time: Instant,
}

/// Body of `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub protocol: Protocol,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: ConnectionCounts,
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusReport> {
    let connections = *state.counts.borrow();
    Json(StatusReport {
        protocol: state.protocol,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connections,
    })
}

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.export_prometheus(),
    )
}
