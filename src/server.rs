//! Proxy Server
//!
//! Owns the listening socket and spawns one coordinator task per accepted
//! connection until shutdown is signalled.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::accounting::AccountingHandle;
use crate::config::Config;
use crate::pool::BufferPool;
use crate::relay::SessionCoordinator;
use crate::Result;

pub struct ProxyServer {
    listener: TcpListener,
    coordinator: Arc<SessionCoordinator>,
}

impl ProxyServer {
    /// Bind the configured address
    pub async fn bind(
        config: &Config,
        pool: Arc<BufferPool>,
        accounting: AccountingHandle,
    ) -> Result<Self> {
        let bind_addr = config.server.bind_addr;
        info!("Binding TCP listener to {}", bind_addr);
        debug!(
            buffer_size = pool.buffer_size(),
            pool_capacity = pool.capacity(),
            "Relay buffer pool ready"
        );
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", bind_addr))?;

        Ok(Self {
            listener,
            coordinator: Arc::new(SessionCoordinator::new(config, pool, accounting)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Accept connections until a shutdown signal arrives
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            "listening on {}://{}...",
            self.coordinator.frontend().protocol(),
            self.local_addr()?
        );

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            debug!("Accepted connection from {}", addr);
                            let coordinator = Arc::clone(&self.coordinator);
                            tokio::spawn(async move {
                                coordinator.run(stream, addr).await;
                            });
                        }
                        Err(e) => {
                            // Keep accepting even if one accept fails
                            error!("Error accepting connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, stopping connection acceptance");
                    break;
                }
            }
        }

        info!("Connection acceptance loop stopped");
        Ok(())
    }
}
