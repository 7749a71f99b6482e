//! RelayProxy Library
//! 
//! Forward proxy relay engine with HTTP/CONNECT and SOCKS5 front ends.
//! 
//! Each accepted connection is handled by a session coordinator that runs the
//! front-end handshake, dials the origin and pumps bytes in both directions
//! until either side finishes or goes idle. Connection counts are kept by a
//! single accounting task fed through a non-blocking event queue.

pub mod accounting;
pub mod config;
pub mod pool;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod status;

pub use config::Config;
pub use pool::BufferPool;
pub use server::ProxyServer;
pub use shutdown::ShutdownCoordinator;

/// Common error type for the proxy server
pub type Result<T> = anyhow::Result<T>;
