//! Graceful Shutdown Handling
//!
//! Turns SIGTERM/SIGINT into a broadcast the listener and status endpoint
//! stop on, then waits for live sessions to drain.

use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::accounting::ConnectionCounts;
use crate::Result;

/// Shutdown coordinator that manages graceful shutdown process
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx, timeout }
    }

    /// Get a shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Broadcast shutdown to every subscriber
    pub fn trigger(&self) {
        if self.shutdown_tx.send(()).is_err() {
            warn!("Shutdown signalled with no listeners");
        }
    }

    /// Wait for SIGTERM, SIGINT or Ctrl+C, then trigger shutdown
    pub async fn listen_for_signals(&self) -> Result<()> {
        info!("Starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        self.trigger();
        Ok(())
    }

    /// Wait until no client sessions remain or the timeout elapses.
    ///
    /// Returns true when every session drained in time.
    pub async fn wait_for_sessions(&self, mut counts: watch::Receiver<ConnectionCounts>) -> bool {
        let start_time = Instant::now();
        let active = counts.borrow().clients;
        info!("Waiting for {} active sessions to close (timeout: {:?})", active, self.timeout);

        let drained = tokio::time::timeout(self.timeout, counts.wait_for(|c| c.clients == 0))
            .await
            .map(|seen| seen.is_ok());
        let elapsed = start_time.elapsed();
        match drained {
            Ok(true) => {
                info!("All sessions closed gracefully in {:?}", elapsed);
                true
            }
            Ok(false) => {
                warn!("Accounting stopped before sessions drained");
                false
            }
            Err(_) => {
                warn!(
                    "Shutdown timeout reached after {:?} with {} sessions still active",
                    elapsed,
                    counts.borrow().clients
                );
                false
            }
        }
    }
}
