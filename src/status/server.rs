//! Status HTTP Server

use anyhow::Context;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use super::handlers::{get_metrics, get_status, health_check, AppState};
use crate::Result;

pub struct StatusServer {
    bind_addr: SocketAddr,
    state: AppState,
}

impl StatusServer {
    pub fn new(bind_addr: SocketAddr, state: AppState) -> Self {
        Self { bind_addr, state }
    }

    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/status", get(get_status))
            .route("/metrics", get(get_metrics))
            .with_state(state)
    }

    /// Serve until the shutdown broadcast fires
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind status endpoint to {}", self.bind_addr))?;
        info!("Status endpoint listening on {}", self.bind_addr);

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .context("Status endpoint failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::{ConnectionCounts, RelayMetrics};
    use crate::config::Protocol;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::sync::watch;
    use tower::ServiceExt;

    fn state(counts: ConnectionCounts) -> (AppState, watch::Sender<ConnectionCounts>) {
        let (tx, rx) = watch::channel(counts);
        let metrics = Arc::new(RelayMetrics::new().unwrap());
        metrics.update(&counts);
        let state = AppState {
            protocol: Protocol::Socks5,
            counts: rx,
            metrics,
            start_time: Instant::now(),
        };
        (state, tx)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _tx) = state(ConnectionCounts::default());
        let (status, body) = get(StatusServer::router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_status_reports_counts() {
        let (state, _tx) = state(ConnectionCounts {
            clients: 4,
            origins: 3,
            ..Default::default()
        });
        let (status, body) = get(StatusServer::router(state), "/status").await;
        assert_eq!(status, StatusCode::OK);

        let report: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(report["protocol"], "socks5");
        assert_eq!(report["connections"]["clients"], 4);
        assert_eq!(report["connections"]["origins"], 3);
    }

    #[tokio::test]
    async fn test_metrics_text() {
        let (state, _tx) = state(ConnectionCounts { clients: 1, ..Default::default() });
        let (status, body) = get(StatusServer::router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("relayproxy_client_connections 1"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (state, _tx) = state(ConnectionCounts::default());
        let (status, _) = get(StatusServer::router(state), "/config").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
