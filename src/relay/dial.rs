//! Origin Dialer

use anyhow::{anyhow, Context};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::protocol::TargetAddr;
use crate::Result;

/// Opens the origin connection for a negotiated target
#[derive(Debug, Clone)]
pub struct Dialer {
    timeout: Duration,
}

impl Dialer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server.dial_timeout)
    }

    /// Resolve and connect, bounded by one overall timeout
    pub async fn connect(&self, target: &TargetAddr) -> Result<TcpStream> {
        match timeout(self.timeout, self.connect_any(target)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("Connection to {} timed out after {:?}", target, self.timeout)),
        }
    }

    async fn connect_any(&self, target: &TargetAddr) -> Result<TcpStream> {
        let addrs = self.resolve(target).await?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!("Connected to origin {} via {}", target, addr);
                    return Ok(stream);
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(anyhow!("Failed to connect to {}: {}", target, e)),
            None => Err(anyhow!("Failed to connect to {}: no addresses resolved", target)),
        }
    }

    async fn resolve(&self, target: &TargetAddr) -> Result<Vec<SocketAddr>> {
        match target {
            TargetAddr::Ip(addr) => Ok(vec![*addr]),
            TargetAddr::Domain(domain, port) => {
                debug!("Resolving domain: {}:{}", domain, port);
                let addrs: Vec<SocketAddr> = lookup_host((domain.as_str(), *port))
                    .await
                    .with_context(|| format!("DNS resolution failed for {}", domain))?
                    .collect();
                if addrs.is_empty() {
                    return Err(anyhow!("DNS resolution returned no addresses for {}", domain));
                }
                Ok(addrs)
            }
        }
    }
}
