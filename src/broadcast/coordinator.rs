//! Room broadcast coordination
//!
//! The [`Broadcaster`] owns the fan-out path: it snapshots a room's live
//! sessions from the registry and pushes a frame into each session's
//! outbound queue. No socket I/O happens here; actual writes are done by
//! each session's writer task.
//!
//! Two rules hold for every broadcast:
//!
//! - A failed delivery never interrupts the loop. The remaining members
//!   still get the frame; the failed session is deregistered afterwards
//!   and its departure announced to the survivors.
//! - A chat message reaches the durable store before any session sees it.
//!   If the store write fails, nothing is broadcast.

use std::sync::Arc;

use crate::auth::Identity;
use crate::protocol::ServerFrame;
use crate::registry::{RoomRegistry, SessionHandle};
use crate::stats::ServerStats;
use crate::store::{ChatStore, StoreError, StoredMessage};

/// Why a message could not be published
#[derive(Debug)]
pub enum PublishError {
    /// Message body was empty after trimming
    EmptyMessage,
    /// The durable write failed; nothing was broadcast
    Store(StoreError),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::EmptyMessage => write!(f, "Message body is empty"),
            PublishError::Store(e) => write!(f, "Message could not be stored: {}", e),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::EmptyMessage => None,
            PublishError::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for PublishError {
    fn from(e: StoreError) -> Self {
        PublishError::Store(e)
    }
}

/// Fans frames out to a room's live sessions
pub struct Broadcaster {
    registry: Arc<RoomRegistry>,
    store: Arc<dyn ChatStore>,
    stats: Arc<ServerStats>,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<RoomRegistry>,
        store: Arc<dyn ChatStore>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            registry,
            store,
            stats,
        }
    }

    /// Send `frame` to every live session in `room`, except the session
    /// named by `exclude`.
    ///
    /// Returns how many sessions accepted the frame. Sessions whose
    /// outbound queue is closed are deregistered once the delivery loop
    /// has finished, and a `user_left` notice goes out for each one.
    pub async fn announce(&self, room: &str, frame: ServerFrame, exclude: Option<u64>) -> usize {
        let (delivered, mut dead) = self.deliver(room, &frame, exclude).await;

        // A departure notice can itself hit a dead session, so keep
        // pruning until a pass completes without new failures.
        while !dead.is_empty() {
            let mut next = Vec::new();
            for handle in dead {
                self.stats.broadcast_failure();
                if self.registry.deregister(&handle).await {
                    tracing::warn!(
                        room = %room,
                        user = %handle.username(),
                        session_id = handle.session_id(),
                        "Dead session pruned during broadcast"
                    );
                    let notice = ServerFrame::user_left(handle.username());
                    let (_, more) = self.deliver(room, &notice, None).await;
                    next.extend(more);
                }
            }
            dead = next;
        }

        delivered
    }

    /// One delivery pass over the room's current membership. Failed
    /// handles are returned, not acted on.
    async fn deliver(
        &self,
        room: &str,
        frame: &ServerFrame,
        exclude: Option<u64>,
    ) -> (usize, Vec<SessionHandle>) {
        let members = self.registry.members_of(room).await;
        let mut delivered = 0;
        let mut dead = Vec::new();

        for member in members {
            if exclude == Some(member.session_id()) {
                continue;
            }
            match member.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(member),
            }
        }

        (delivered, dead)
    }

    /// Persist a chat message, then fan it out to the whole room.
    ///
    /// The author gets the message back too; clients render their own
    /// messages from the broadcast, which carries the store-assigned id
    /// and timestamp.
    pub async fn publish_message(
        &self,
        room: &str,
        room_id: i64,
        author: &Identity,
        content: &str,
    ) -> Result<StoredMessage, PublishError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(PublishError::EmptyMessage);
        }

        let stored = self
            .store
            .append_message(room_id, author.user_id, content)
            .await?;
        self.stats.message_published();
        tracing::debug!(
            room = %room,
            user = %author.username,
            message_id = stored.id,
            "Message stored, fanning out"
        );

        let frame = ServerFrame::NewMessage {
            data: stored.clone(),
        };
        self.announce(room, frame, None).await;

        Ok(stored)
    }

    /// Tell the rest of the room that `subject` has joined.
    pub async fn announce_join(&self, subject: &SessionHandle) -> usize {
        let notice = ServerFrame::user_joined(subject.username());
        self.announce(subject.room(), notice, Some(subject.session_id()))
            .await
    }

    /// Tell the rest of the room that `subject` has left.
    pub async fn announce_leave(&self, subject: &SessionHandle) -> usize {
        let notice = ServerFrame::user_left(subject.username());
        self.announce(subject.room(), notice, Some(subject.session_id()))
            .await
    }
}
