//! Relay Session

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::Protocol;

/// Lifecycle of one proxied connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Handshaking,
    Relaying,
    Closing,
    Done,
}

/// One accepted client connection, from accept to teardown
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub protocol: Protocol,
    pub peer: SocketAddr,
    pub start_time: Instant,
    state: SessionState,
    closed: AtomicBool,
    origin_connected: AtomicBool,
    closing: watch::Sender<bool>,
}

impl Session {
    pub fn new(protocol: Protocol, peer: SocketAddr) -> Self {
        let (closing, _) = watch::channel(false);
        let id = Uuid::new_v4();
        trace!(session_id = %id, peer = %peer, "Creating session");

        Self {
            id,
            protocol,
            peer,
            start_time: Instant::now(),
            state: SessionState::Accepted,
            closed: AtomicBool::new(false),
            origin_connected: AtomicBool::new(false),
            closing,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, next: SessionState) {
        trace!(session_id = %self.id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    /// Mark the session closed and signal its pumps.
    ///
    /// Returns true only for the caller that actually closed it.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.closing.send_replace(true);
        debug!(session_id = %self.id, "Session closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// A receiver that turns true once the session is closed
    pub fn closing_signal(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    pub fn mark_origin_connected(&self) {
        self.origin_connected.store(true, Ordering::Release);
    }

    pub fn origin_connected(&self) -> bool {
        self.origin_connected.load(Ordering::Acquire)
    }

    pub fn duration(&self) -> Duration {
        self.start_time.elapsed()
    }
}
