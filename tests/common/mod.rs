//! Shared harness for the proxy integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use relayproxy::accounting::{AccountingService, ConnectionCounts, LogSink};
use relayproxy::config::{Config, Protocol};
use relayproxy::{BufferPool, ProxyServer, ShutdownCoordinator};

pub struct TestProxy {
    pub addr: SocketAddr,
    pub counts: watch::Receiver<ConnectionCounts>,
    pub pool: Arc<BufferPool>,
    pub shutdown: ShutdownCoordinator,
}

impl TestProxy {
    /// Wait until the accounting task has processed `events` events
    pub async fn counts_after(&mut self, events: u64) -> ConnectionCounts {
        let counts = tokio::time::timeout(
            Duration::from_secs(5),
            self.counts.wait_for(|c| c.events_processed >= events),
        )
        .await
        .expect("accounting did not catch up")
        .expect("accounting stopped");
        *counts
    }
}

pub fn test_config(protocol: Protocol) -> Config {
    let mut config = Config::default();
    config.server.bind_addr = "127.0.0.1:0".parse().unwrap();
    config.server.protocol = protocol;
    config.server.dial_timeout = Duration::from_secs(2);
    config.server.idle_timeout = Duration::from_secs(5);
    config
}

pub async fn start_proxy(config: Config) -> TestProxy {
    let pool = Arc::new(BufferPool::new(
        config.buffers.buffer_size,
        config.buffers.pool_capacity,
    ));
    let (accounting, handle) =
        AccountingService::new(config.monitoring.event_queue_capacity, pool.clone());
    let accounting = accounting.with_sink(LogSink);
    let counts = accounting.subscribe();
    accounting.spawn();

    let server = ProxyServer::bind(&config, pool.clone(), handle).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = ShutdownCoordinator::new(Duration::from_secs(5));
    tokio::spawn(server.run(shutdown.subscribe()));

    TestProxy { addr, counts, pool, shutdown }
}

/// Origin that echoes every connection back to itself
pub async fn start_echo_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// An address nothing is listening on
pub async fn closed_port() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
}

pub async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .expect("read timed out")
        .unwrap();
    buf
}

/// Read until the peer closes, returning everything received
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("peer did not close")
        .unwrap_or_default();
    buf
}

pub async fn echo_round_trip(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).await.unwrap();
    assert_eq!(read_exactly(stream, payload.len()).await, payload);
}

/// Stream `len` patterned bytes through the proxy while reading the echo
/// concurrently, so payloads larger than the socket buffers cannot stall
pub async fn bulk_echo(stream: &mut TcpStream, len: usize) {
    let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let (mut reader, mut writer) = stream.split();

    let send = async {
        writer.write_all(&payload).await.unwrap();
    };
    let receive = async {
        let mut echoed = vec![0u8; len];
        reader.read_exact(&mut echoed).await.unwrap();
        echoed
    };
    let ((), echoed) = tokio::time::timeout(Duration::from_secs(20), async {
        tokio::join!(send, receive)
    })
    .await
    .expect("bulk echo stalled");

    assert!(echoed == payload, "echoed payload differs from what was sent");
}
