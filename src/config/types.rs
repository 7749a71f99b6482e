//! Configuration Types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::{DEFAULT_BUFFER_SIZE, DEFAULT_POOL_CAPACITY};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub buffers: BufferConfig,
    pub socks5: Socks5Config,
    pub monitoring: MonitoringConfig,
}

/// Front-end protocol spoken on the listening socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Socks5,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Socks5 => write!(f, "socks5"),
        }
    }
}

impl FromStr for Protocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "socks5" => Ok(Protocol::Socks5),
            other => Err(anyhow::anyhow!("unsupport protocol: '{}'", other)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub protocol: Protocol,
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    pub max_request_head: usize,
}

/// Relay buffer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    pub buffer_size: usize,
    pub pool_capacity: usize,
}

/// SOCKS5 front-end configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Socks5Config {
    pub report_bound_addr: bool,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub console_status: bool,
    pub status_addr: Option<SocketAddr>,
    pub event_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            protocol: Protocol::Http,
            dial_timeout: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(20),
            shutdown_timeout: Duration::from_secs(30),
            max_request_head: 64 * 1024,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            console_status: false,
            status_addr: None,
            event_queue_capacity: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            buffers: BufferConfig::default(),
            socks5: Socks5Config::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}
