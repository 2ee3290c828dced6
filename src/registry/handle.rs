//! Session handles
//!
//! A [`SessionHandle`] is the registry's cloneable view of one live session:
//! its id, its authenticated identity, its room, and the outbound channel
//! drained by the session's writer task. Everything the broadcast path needs
//! to deliver a frame, nothing it does not.

use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::protocol::ServerFrame;

use super::error::RegistryError;

/// Cloneable view of one live session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: u64,
    identity: Identity,
    room: String,
    outbound: mpsc::UnboundedSender<ServerFrame>,
}

impl SessionHandle {
    pub fn new(
        session_id: u64,
        identity: Identity,
        room: impl Into<String>,
        outbound: mpsc::UnboundedSender<ServerFrame>,
    ) -> Self {
        Self {
            session_id,
            identity,
            room: room.into(),
            outbound,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Queue a frame for delivery.
    ///
    /// Fails once the session's writer task has stopped. Queueing success
    /// does not guarantee the socket write succeeds; a failed write stops
    /// the writer, and every later send on the handle fails.
    pub fn send(&self, frame: ServerFrame) -> Result<(), RegistryError> {
        self.outbound
            .send(frame)
            .map_err(|_| RegistryError::SessionClosed(self.session_id))
    }

    /// Liveness probe: a lightweight real send.
    ///
    /// Queues a `pong` the peer will ignore. A dead-but-undetected session
    /// either fails here immediately (writer already gone) or fails the
    /// flush, which stops its writer and makes the next probe fail.
    pub fn probe(&self) -> bool {
        self.send(ServerFrame::Pong).is_ok()
    }

    /// Whether the outbound channel is still open
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(session_id: u64) -> (SessionHandle, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(session_id, Identity::new(1, "alice"), "lobby", tx);
        (handle, rx)
    }

    #[tokio::test]
    async fn test_send_reaches_receiver() {
        let (handle, mut rx) = handle(1);

        handle.send(ServerFrame::Pong).unwrap();
        assert_eq!(rx.recv().await, Some(ServerFrame::Pong));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (handle, rx) = handle(1);
        drop(rx);

        let err = handle.send(ServerFrame::Pong).unwrap_err();
        assert!(matches!(err, RegistryError::SessionClosed(1)));
    }

    #[tokio::test]
    async fn test_probe_tracks_liveness() {
        let (handle, rx) = handle(1);

        assert!(handle.is_open());
        assert!(handle.probe());

        drop(rx);
        assert!(!handle.is_open());
        assert!(!handle.probe());
    }
}
