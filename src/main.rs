//! RelayProxy - HTTP/CONNECT and SOCKS5 forward proxy

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relayproxy::{
    accounting::{AccountingService, ConsoleSink, LogSink, PrometheusSink, RelayMetrics},
    config::{ConfigManager, Protocol},
    status::{AppState, StatusServer},
    BufferPool, ProxyServer, ShutdownCoordinator,
};

/// CLI arguments for RelayProxy
#[derive(Parser, Debug)]
#[command(name = "relayproxy")]
#[command(about = "RelayProxy - HTTP/CONNECT and SOCKS5 forward proxy")]
#[command(version)]
#[command(long_about = "
RelayProxy - HTTP/CONNECT and SOCKS5 forward proxy

Usage: relayproxy [protocol] [ip:port]

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  RELAYPROXY_BIND_ADDR      - Bind address (e.g., 127.0.0.1:8080)
  RELAYPROXY_PROTOCOL       - Front-end protocol (http, socks5)
  RELAYPROXY_DIAL_TIMEOUT   - Origin dial timeout (e.g., 20s)
  RELAYPROXY_IDLE_TIMEOUT   - Relay idle timeout (e.g., 20s)
  RELAYPROXY_BUFFER_SIZE    - Relay buffer size in bytes
  RELAYPROXY_POOL_CAPACITY  - Idle buffers kept by the pool
  RELAYPROXY_STATUS_ADDR    - Status endpoint address
  RELAYPROXY_LOG_LEVEL      - Log level (trace, debug, info, warn, error)
")]
pub struct CliArgs {
    /// Front-end protocol (http or socks5)
    #[arg(help = "Front-end protocol: http or socks5")]
    pub protocol: Option<Protocol>,

    /// Listen address (overrides config file)
    #[arg(help = "Listen address, e.g. 127.0.0.1:8080")]
    pub addr: Option<SocketAddr>,

    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Status endpoint address
    #[arg(long, help = "Serve /health, /status and /metrics on this address")]
    pub status_addr: Option<SocketAddr>,

    /// Print the live connection count on the terminal
    #[arg(long, help = "Print the live connection count on the terminal")]
    pub console_status: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Load configuration with priority: CLI args > config file > environment > defaults
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };

    init_tracing(&args, &config.monitoring.log_level)?;
    info!("Starting RelayProxy v{}", env!("CARGO_PKG_VERSION"));

    config.merge_with_cli_args(args.protocol, args.addr, args.status_addr, args.console_status);
    config
        .validate()
        .context("Final configuration validation failed")?;

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Protocol: {}", config.server.protocol);
        info!("  Bind address: {}", config.server.bind_addr);
        info!("  Dial timeout: {:?}", config.server.dial_timeout);
        info!("  Idle timeout: {:?}", config.server.idle_timeout);
        info!(
            "  Buffers: {} bytes, pool capacity {}",
            config.buffers.buffer_size, config.buffers.pool_capacity
        );
        match config.monitoring.status_addr {
            Some(addr) => info!("  Status endpoint: {}", addr),
            None => info!("  Status endpoint: disabled"),
        }
        return Ok(());
    }

    let pool = Arc::new(BufferPool::new(
        config.buffers.buffer_size,
        config.buffers.pool_capacity,
    ));
    let metrics = Arc::new(RelayMetrics::new()?);

    let (accounting, handle) =
        AccountingService::new(config.monitoring.event_queue_capacity, pool.clone());
    let mut accounting = accounting
        .with_sink(LogSink)
        .with_sink(PrometheusSink::new(metrics.clone()));
    if config.monitoring.console_status {
        accounting = accounting.with_sink(ConsoleSink::stdout());
    }
    let counts = accounting.subscribe();
    accounting.spawn();

    let shutdown_coordinator = ShutdownCoordinator::new(config.server.shutdown_timeout);

    let status_handle = config.monitoring.status_addr.map(|addr| {
        let state = AppState {
            protocol: config.server.protocol,
            counts: counts.clone(),
            metrics: metrics.clone(),
            start_time: Instant::now(),
        };
        let shutdown_rx = shutdown_coordinator.subscribe();
        tokio::spawn(async move {
            if let Err(e) = StatusServer::new(addr, state).start(shutdown_rx).await {
                error!("Status endpoint error: {:#}", e);
            }
        })
    });

    let server = ProxyServer::bind(&config, pool, handle).await?;
    let shutdown_rx = shutdown_coordinator.subscribe();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("Server error: {:#}", e);
        }
    });

    info!("Press Ctrl+C or send SIGTERM/SIGINT to shutdown gracefully");
    if let Err(e) = shutdown_coordinator.listen_for_signals().await {
        error!("Error setting up signal handlers: {}", e);
        shutdown_coordinator.trigger();
    }

    if let Err(e) = server_handle.await {
        error!("Server task failed: {}", e);
    }
    shutdown_coordinator.wait_for_sessions(counts).await;

    if let Some(handle) = status_handle {
        let _ = handle.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs, configured_level: &str) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        args.log_level.as_deref().unwrap_or(configured_level)
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
