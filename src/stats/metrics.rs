//! Server-wide counters
//!
//! One `ServerStats` instance is shared by every connection task, so all
//! counters are atomics. Readers take a [`StatsSnapshot`] instead of
//! touching the atomics directly.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for the lifetime of a server.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    total_connections: AtomicU64,
    /// Connections currently open
    active_connections: AtomicU64,
    /// Connections dropped at the accept gate (connection limit)
    rejected_connections: AtomicU64,
    /// Handshakes that failed verification or room lookup
    auth_failures: AtomicU64,
    /// Messages durably written and fanned out
    messages_published: AtomicU64,
    /// Individual deliveries that failed during a broadcast
    broadcast_failures: AtomicU64,
    /// Sessions replaced by a newer connection for the same user
    evictions: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn broadcast_failure(&self) {
        self.broadcast_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter at one point in time.
    ///
    /// The registry-derived gauges (`active_rooms`, `active_sessions`) are
    /// zero here; the server fills them in from its own registry.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            broadcast_failures: self.broadcast_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            ..StatsSnapshot::default()
        }
    }
}

/// Point-in-time view of server counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Connections currently open
    pub active_connections: u64,
    /// Connections dropped at the accept gate
    pub rejected_connections: u64,
    /// Handshakes that failed verification or room lookup
    pub auth_failures: u64,
    /// Messages durably written and fanned out
    pub messages_published: u64,
    /// Individual deliveries that failed during a broadcast
    pub broadcast_failures: u64,
    /// Sessions replaced by a newer connection for the same user
    pub evictions: u64,
    /// Rooms with at least one live session
    pub active_rooms: u64,
    /// Live sessions across all rooms
    pub active_sessions: u64,
}
