//! Configuration Manager

use super::{Config, Protocol};
use crate::Result;
use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::Path;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config.validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!("Configuration file not found at {}, using defaults", path.display());
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Override fields from `RELAYPROXY_*` variables looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_addr) = lookup("RELAYPROXY_BIND_ADDR") {
            self.server.bind_addr = bind_addr.parse::<SocketAddr>()
                .with_context(|| format!("Invalid RELAYPROXY_BIND_ADDR: {}", bind_addr))?;
        }

        if let Some(protocol) = lookup("RELAYPROXY_PROTOCOL") {
            self.server.protocol = protocol.parse::<Protocol>()
                .with_context(|| format!("Invalid RELAYPROXY_PROTOCOL: {}", protocol))?;
        }

        if let Some(timeout) = lookup("RELAYPROXY_DIAL_TIMEOUT") {
            self.server.dial_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid RELAYPROXY_DIAL_TIMEOUT: {}", timeout))?;
        }

        if let Some(timeout) = lookup("RELAYPROXY_IDLE_TIMEOUT") {
            self.server.idle_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid RELAYPROXY_IDLE_TIMEOUT: {}", timeout))?;
        }

        if let Some(buffer_size) = lookup("RELAYPROXY_BUFFER_SIZE") {
            self.buffers.buffer_size = buffer_size.parse::<usize>()
                .with_context(|| format!("Invalid RELAYPROXY_BUFFER_SIZE: {}", buffer_size))?;
        }

        if let Some(capacity) = lookup("RELAYPROXY_POOL_CAPACITY") {
            self.buffers.pool_capacity = capacity.parse::<usize>()
                .with_context(|| format!("Invalid RELAYPROXY_POOL_CAPACITY: {}", capacity))?;
        }

        if let Some(status_addr) = lookup("RELAYPROXY_STATUS_ADDR") {
            self.monitoring.status_addr = Some(status_addr.parse::<SocketAddr>()
                .with_context(|| format!("Invalid RELAYPROXY_STATUS_ADDR: {}", status_addr))?);
        }

        if let Some(log_level) = lookup("RELAYPROXY_LOG_LEVEL") {
            self.monitoring.log_level = log_level;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .with_context(|| "Server configuration validation failed")?;

        self.validate_buffer_config()
            .with_context(|| "Buffer configuration validation failed")?;

        self.validate_monitoring_config()
            .with_context(|| "Monitoring configuration validation failed")?;

        Ok(())
    }

    fn validate_server_config(&self) -> Result<()> {
        if self.server.dial_timeout.is_zero() {
            bail!("dial_timeout must be greater than 0");
        }

        if self.server.idle_timeout.is_zero() {
            bail!("idle_timeout must be greater than 0");
        }

        if self.server.max_request_head < 1024 {
            bail!("max_request_head must be at least 1024 bytes");
        }

        Ok(())
    }

    fn validate_buffer_config(&self) -> Result<()> {
        if self.buffers.buffer_size < 512 {
            bail!("buffer_size must be at least 512 bytes");
        }

        if self.buffers.buffer_size > 1048576 {
            bail!("buffer_size cannot exceed 1MB");
        }

        if self.buffers.pool_capacity == 0 {
            bail!("pool_capacity must be greater than 0");
        }

        Ok(())
    }

    fn validate_monitoring_config(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.monitoring.log_level.as_str()) {
            bail!("monitoring.log_level must be one of: {}", valid_log_levels.join(", "));
        }

        if self.monitoring.event_queue_capacity == 0 {
            bail!("event_queue_capacity must be greater than 0");
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        protocol: Option<Protocol>,
        bind: Option<SocketAddr>,
        status_addr: Option<SocketAddr>,
        console_status: bool,
    ) {
        if let Some(protocol) = protocol {
            self.server.protocol = protocol;
            tracing::info!("CLI override: protocol set to {}", protocol);
        }

        if let Some(addr) = bind {
            self.server.bind_addr = addr;
            tracing::info!("CLI override: bind address set to {}", addr);
        }

        if let Some(addr) = status_addr {
            self.monitoring.status_addr = Some(addr);
            tracing::info!("CLI override: status endpoint set to {}", addr);
        }

        if console_status {
            self.monitoring.console_status = true;
        }
    }
}
