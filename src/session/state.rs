//! Session state machine
//!
//! Tracks one connection from accept to teardown. Phases only move
//! forward; `close` is the single exit point and reports whether this
//! call was the one that closed the session, so teardown work runs once
//! even when several code paths race to clean up.

use std::net::SocketAddr;
use std::time::Instant;

use crate::auth::Identity;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP connected, reader not yet waiting for the handshake
    Connecting,
    /// Waiting for the `auth` frame, deadline armed
    AwaitingAuth,
    /// Handshake accepted; the session is visible to its room
    Authenticated,
    /// Torn down; no further transitions
    Closed,
}

/// Complete per-connection state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when the handshake was accepted
    pub authenticated_at: Option<Instant>,

    /// Verified identity, set on authentication
    pub identity: Option<Identity>,

    /// Room joined at authentication time
    pub room: Option<String>,
}

impl SessionState {
    /// Create state for a freshly accepted connection
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            authenticated_at: None,
            identity: None,
            room: None,
        }
    }

    /// Start waiting for the handshake frame
    pub fn start_auth(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::AwaitingAuth;
        }
    }

    /// Record an accepted handshake
    pub fn on_authenticated(&mut self, identity: Identity, room: impl Into<String>) {
        if self.phase == SessionPhase::AwaitingAuth {
            self.phase = SessionPhase::Authenticated;
            self.authenticated_at = Some(Instant::now());
            self.identity = Some(identity);
            self.room = Some(room.into());
        }
    }

    /// Close the session. Returns `true` only for the call that actually
    /// performed the transition; later calls are no-ops.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        true
    }

    /// Whether the handshake has been accepted
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// Username, once authenticated
    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
