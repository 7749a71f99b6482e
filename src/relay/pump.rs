//! Relay Pump
//!
//! Copies one direction of a session. Every read is bounded by the idle
//! timeout, and the session's closing signal interrupts a pending read or
//! write. The pump hands its stream halves back when it ends; closing the
//! sockets is left to the coordinator.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::trace;

use crate::pool::BufferPool;

/// Why a pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    Eof,
    IdleTimeout,
    ReadError,
    WriteError,
    /// The session was closed by the other direction
    Closed,
}

/// What a finished pump returns to the coordinator
#[derive(Debug)]
pub struct PumpReport<R, W> {
    pub reader: R,
    pub writer: W,
    pub bytes: u64,
    pub end: PumpEnd,
}

/// Copy from `reader` to `writer` until EOF, an error, the idle timeout or
/// the closing signal
pub async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    pool: Arc<BufferPool>,
    idle_timeout: Duration,
    mut closing: watch::Receiver<bool>,
) -> PumpReport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = pool.acquire();
    let mut bytes = 0u64;

    let end = loop {
        if *closing.borrow() {
            break PumpEnd::Closed;
        }

        let n = tokio::select! {
            biased;
            _ = closing.changed() => break PumpEnd::Closed,
            read = timeout(idle_timeout, reader.read(&mut buf)) => match read {
                Err(_) => break PumpEnd::IdleTimeout,
                Ok(Err(e)) => {
                    trace!("Pump read failed: {}", e);
                    break PumpEnd::ReadError;
                }
                Ok(Ok(0)) => break PumpEnd::Eof,
                Ok(Ok(n)) => n,
            },
        };

        let written = tokio::select! {
            biased;
            _ = closing.changed() => break PumpEnd::Closed,
            written = writer.write_all(&buf[..n]) => written,
        };
        if let Err(e) = written {
            trace!("Pump write failed: {}", e);
            break PumpEnd::WriteError;
        }
        bytes += n as u64;
    };

    pool.release(buf);
    PumpReport { reader, writer, bytes, end }
}
