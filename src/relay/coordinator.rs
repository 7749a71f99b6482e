//! Session Coordinator
//!
//! Drives one accepted connection through handshake, dial, relay and
//! teardown, and reports its lifecycle to the accounting task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn, Span};

use super::pump::{pump, PumpEnd};
use super::{Dialer, Session, SessionState};
use crate::accounting::{AccountingHandle, ConnectionEvent};
use crate::config::Config;
use crate::pool::BufferPool;
use crate::protocol::Frontend;
use crate::Result;

/// Totals of a finished relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub bytes_up: u64,
    pub bytes_down: u64,
    /// How the direction that finished first ended
    pub first_end: PumpEnd,
}

/// Shared by every connection task of one listener
pub struct SessionCoordinator {
    frontend: Frontend,
    dialer: Dialer,
    pool: Arc<BufferPool>,
    accounting: AccountingHandle,
    idle_timeout: Duration,
}

impl SessionCoordinator {
    pub fn new(config: &Config, pool: Arc<BufferPool>, accounting: AccountingHandle) -> Self {
        Self {
            frontend: Frontend::from_config(config),
            dialer: Dialer::from_config(config),
            pool,
            accounting,
            idle_timeout: config.server.idle_timeout,
        }
    }

    pub fn frontend(&self) -> &Frontend {
        &self.frontend
    }

    /// Serve one accepted TCP connection to completion
    pub async fn run(&self, client: TcpStream, peer: SocketAddr) {
        let local_addr = client.local_addr().ok();
        self.serve(client, peer, local_addr).await;
    }

    /// Serve one client stream to completion. Errors end the session and
    /// are only logged.
    #[instrument(
        name = "session",
        skip_all,
        fields(peer = %peer, session_id = tracing::field::Empty)
    )]
    pub async fn serve<S>(&self, client: S, peer: SocketAddr, local_addr: Option<SocketAddr>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut session = Session::new(self.frontend.protocol(), peer);
        Span::current().record("session_id", tracing::field::display(session.id));
        self.accounting.submit(ConnectionEvent::ClientConnect);

        if let Err(e) = self.drive(&mut session, client, local_addr).await {
            debug!("Session ended early: {:#}", e);
        }

        session.close();
        session.transition(SessionState::Closing);
        self.accounting.submit(ConnectionEvent::ClientClose);
        if session.origin_connected() {
            self.accounting.submit(ConnectionEvent::OriginClose);
        }
        session.transition(SessionState::Done);
        debug!("Session finished after {:?}", session.duration());
    }

    async fn drive<S>(
        &self,
        session: &mut Session,
        mut client: S,
        local_addr: Option<SocketAddr>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        session.transition(SessionState::Handshaking);
        let negotiated = self.frontend.negotiate(&mut client, local_addr).await?;
        let target = negotiated.target().clone();

        let mut origin = match self.dialer.connect(&target).await {
            Ok(origin) => origin,
            Err(e) => {
                warn!(target = %target, "Failed to connect to origin: {:#}", e);
                self.frontend.refuse(&mut client).await;
                return Err(e);
            }
        };
        session.mark_origin_connected();
        self.accounting.submit(ConnectionEvent::OriginConnect);

        let origin_local = origin.local_addr().ok();
        self.frontend
            .confirm(&mut client, &mut origin, origin_local, negotiated)
            .await?;

        session.transition(SessionState::Relaying);
        info!(target = %target, "Relaying {} session", session.protocol);
        let stats = relay(session, client, origin, self.pool.clone(), self.idle_timeout).await;
        info!(
            target = %target,
            bytes_up = stats.bytes_up,
            bytes_down = stats.bytes_down,
            first_end = ?stats.first_end,
            "Relay finished"
        );
        Ok(())
    }
}

/// Pump both directions until the first one finishes, then close the
/// session, join the other pump and shut both streams down.
pub async fn relay<C, O>(
    session: &Session,
    client: C,
    origin: O,
    pool: Arc<BufferPool>,
    idle_timeout: Duration,
) -> RelayStats
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    O: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (origin_read, origin_write) = tokio::io::split(origin);

    let mut upstream = tokio::spawn(pump(
        client_read,
        origin_write,
        pool.clone(),
        idle_timeout,
        session.closing_signal(),
    ));
    let mut downstream = tokio::spawn(pump(
        origin_read,
        client_write,
        pool,
        idle_timeout,
        session.closing_signal(),
    ));

    // The two directions carry different half types, so each arm joins the
    // other pump itself and yields the pair in up/down order
    let (up, down, upstream_first) = tokio::select! {
        report = &mut upstream => {
            session.close();
            (report, downstream.await, true)
        }
        report = &mut downstream => {
            session.close();
            (upstream.await, report, false)
        }
    };

    match (up, down) {
        (Ok(up), Ok(down)) => {
            let first_end = if upstream_first { up.end } else { down.end };
            let stats = RelayStats {
                bytes_up: up.bytes,
                bytes_down: down.bytes,
                first_end,
            };

            let mut client = up.reader.unsplit(down.writer);
            let mut origin = down.reader.unsplit(up.writer);
            let _ = client.shutdown().await;
            let _ = origin.shutdown().await;
            stats
        }
        (up, down) => {
            // Halves held by a failed task are dropped with it
            warn!("Relay pump task failed");
            RelayStats {
                bytes_up: up.map(|r| r.bytes).unwrap_or(0),
                bytes_down: down.map(|r| r.bytes).unwrap_or(0),
                first_end: PumpEnd::ReadError,
            }
        }
    }
}
