//! Per-connection driver
//!
//! One `Connection` task owns a socket for its whole life: handshake,
//! message loop, teardown. The read half stays with this task; the write
//! half moves into a writer task that drains the session's outbound queue,
//! so broadcasts from other sessions never block on this socket.
//!
//! Handshake replies are written directly, before the writer task starts.
//! Registration makes the session visible to broadcasts, and any frame
//! fanned out while the greeting is still being written just waits in the
//! queue; the client always sees `auth_success` then `message_history`
//! before anything else.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::auth::{AuthError, TokenVerifier};
use crate::broadcast::{Broadcaster, PublishError};
use crate::error::ProtocolError;
use crate::protocol::{ClientFrame, FrameReader, FrameWriter, ServerFrame};
use crate::registry::{RegisterOutcome, RoomRegistry, SessionHandle};
use crate::server::config::ServerConfig;
use crate::session::SessionState;
use crate::stats::ServerStats;
use crate::store::ChatStore;

/// What the pre-auth read loop produced
enum AuthAttempt {
    /// The `auth` frame arrived
    Credentials { token: String, room: String },
    /// A valid frame arrived, but not `auth`
    WrongFrame,
    /// Peer disconnected before authenticating
    Disconnected,
}

/// A registered session ready for its message loop
struct ActiveSession {
    handle: SessionHandle,
    outbound: mpsc::UnboundedReceiver<ServerFrame>,
    room_id: i64,
}

/// Driver for a single client connection
pub(crate) struct Connection {
    session_id: u64,
    peer_addr: SocketAddr,
    config: ServerConfig,
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn ChatStore>,
    registry: Arc<RoomRegistry>,
    broadcaster: Arc<Broadcaster>,
    stats: Arc<ServerStats>,
}

impl Connection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn ChatStore>,
        registry: Arc<RoomRegistry>,
        broadcaster: Arc<Broadcaster>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            config,
            verifier,
            store,
            registry,
            broadcaster,
            stats,
        }
    }

    /// Drive the connection to completion.
    ///
    /// Returns `Ok` for every orderly ending, including rejected
    /// handshakes; `Err` means the transport itself failed.
    pub(crate) async fn run(self, socket: TcpStream) -> crate::Result<()> {
        let mut state = SessionState::new(self.session_id, self.peer_addr);
        state.start_auth();

        let (read_half, write_half) = socket.into_split();
        let mut reader = FrameReader::with_limit(read_half, self.config.max_frame_bytes);
        let mut writer = FrameWriter::new(write_half);

        let session = match self.handshake(&mut state, &mut reader, &mut writer).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                // Rejection notice is already on the wire.
                state.close();
                let _ = writer.shutdown().await;
                return Ok(());
            }
            Err(e) => {
                state.close();
                return Err(e);
            }
        };

        let ActiveSession {
            handle,
            outbound,
            room_id,
        } = session;

        tracing::info!(
            session_id = self.session_id,
            user = %handle.username(),
            room = %handle.room(),
            peer = %self.peer_addr,
            "Session authenticated"
        );

        let mut writer_task = tokio::spawn(write_loop(outbound, writer));
        let mut writer_done = false;

        self.broadcaster.announce_join(&handle).await;

        let result = loop {
            tokio::select! {
                joined = &mut writer_task => {
                    writer_done = true;
                    match joined {
                        Ok(Ok(())) => {
                            tracing::debug!(session_id = self.session_id, "Writer closed")
                        }
                        Ok(Err(e)) => {
                            tracing::debug!(session_id = self.session_id, error = %e, "Writer failed")
                        }
                        Err(e) => {
                            tracing::error!(session_id = self.session_id, error = %e, "Writer task panicked")
                        }
                    }
                    break Ok(());
                }
                frame = reader.read_frame::<ClientFrame>() => match frame {
                    Ok(Some(ClientFrame::SendMessage { message })) => {
                        self.on_send_message(&handle, room_id, &message).await;
                    }
                    Ok(Some(ClientFrame::Ping)) => {
                        let _ = handle.send(ServerFrame::Pong);
                    }
                    Ok(Some(ClientFrame::Auth { .. })) => {
                        tracing::warn!(session_id = self.session_id, "Duplicate auth frame");
                        let _ = handle.send(ServerFrame::error("already authenticated"));
                    }
                    Ok(None) => {
                        tracing::debug!(session_id = self.session_id, "Peer disconnected");
                        break Ok(());
                    }
                    Err(crate::Error::Protocol(ProtocolError::Malformed(detail))) => {
                        tracing::warn!(
                            session_id = self.session_id,
                            detail = %detail,
                            "Ignoring unrecognized frame"
                        );
                    }
                    Err(crate::Error::Protocol(ProtocolError::Oversized(limit))) => {
                        tracing::warn!(
                            session_id = self.session_id,
                            limit = limit,
                            "Closing session over frame size limit"
                        );
                        let _ = handle.send(ServerFrame::error("frame exceeds size limit"));
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                }
            }
        };

        // Teardown runs once, whichever branch ended the loop. The leave
        // notice goes out only if this session was still the registered
        // one; an evicted session was already replaced and stays silent.
        if state.close() && self.registry.deregister(&handle).await {
            self.broadcaster.announce_leave(&handle).await;
        }
        tracing::info!(
            session_id = self.session_id,
            user = %handle.username(),
            duration_ms = state.duration().as_millis() as u64,
            "Session closed"
        );

        // With the registry entry gone, dropping our handle closes the
        // outbound queue and lets the writer flush and exit.
        drop(handle);
        if !writer_done {
            let _ = writer_task.await;
        }

        result
    }

    /// Run the handshake: auth frame under deadline, token verification,
    /// room lookup, registration, then the greeting.
    ///
    /// `Ok(Some)` means the session is registered and greeted. `Ok(None)`
    /// is an orderly rejection with the notice already written.
    async fn handshake(
        &self,
        state: &mut SessionState,
        reader: &mut FrameReader<OwnedReadHalf>,
        writer: &mut FrameWriter<OwnedWriteHalf>,
    ) -> crate::Result<Option<ActiveSession>> {
        let attempt = tokio::time::timeout(
            self.config.handshake_timeout,
            self.await_credentials(reader),
        )
        .await;

        let (token, room_key) = match attempt {
            Ok(Ok(AuthAttempt::Credentials { token, room })) => (token, room),
            Ok(Ok(AuthAttempt::WrongFrame)) => {
                tracing::warn!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    "Frame before authentication"
                );
                writer
                    .write_frame(&ServerFrame::error("authentication required"))
                    .await?;
                return Ok(None);
            }
            Ok(Ok(AuthAttempt::Disconnected)) => {
                tracing::debug!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    "Peer closed before authenticating"
                );
                return Ok(None);
            }
            Ok(Err(crate::Error::Protocol(ProtocolError::Oversized(limit)))) => {
                tracing::warn!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    limit = limit,
                    "Oversized line before authentication"
                );
                writer
                    .write_frame(&ServerFrame::error("frame exceeds size limit"))
                    .await?;
                return Ok(None);
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::warn!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    "Handshake deadline expired"
                );
                let _ = writer
                    .write_frame(&ServerFrame::error("authentication timeout"))
                    .await;
                return Ok(None);
            }
        };

        let identity = match self.verifier.verify(&token) {
            Ok(identity) => identity,
            Err(e) => {
                self.stats.auth_failure();
                tracing::warn!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    error = %e,
                    "Token rejected"
                );
                let notice = match e {
                    AuthError::Expired => "token expired",
                    _ => "invalid token",
                };
                writer.write_frame(&ServerFrame::error(notice)).await?;
                return Ok(None);
            }
        };

        let room_id = match self.store.get_room_id(&room_key).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                self.stats.auth_failure();
                tracing::warn!(
                    session_id = self.session_id,
                    user = %identity.username,
                    room = %room_key,
                    "Unknown room"
                );
                writer
                    .write_frame(&ServerFrame::error("room not found"))
                    .await?;
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(
                    session_id = self.session_id,
                    room = %room_key,
                    error = %e,
                    "Failed to resolve room"
                );
                writer
                    .write_frame(&ServerFrame::error("room lookup failed"))
                    .await?;
                return Ok(None);
            }
        };

        let (tx, outbound) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(self.session_id, identity.clone(), room_key.as_str(), tx);

        if let RegisterOutcome::Conflict(existing) = self.registry.register(handle.clone()).await {
            // Same user, same room, older session. A live session wins
            // over the newcomer; a dead one is evicted and replaced.
            if existing.probe() {
                tracing::info!(
                    session_id = self.session_id,
                    user = %identity.username,
                    room = %room_key,
                    existing_session = existing.session_id(),
                    "Rejecting duplicate session"
                );
                writer
                    .write_frame(&ServerFrame::error("already connected elsewhere"))
                    .await?;
                return Ok(None);
            }

            let _ = existing.send(ServerFrame::force_disconnect(
                "Replaced by a newer connection",
            ));
            self.registry.force_evict(&existing).await;
            self.stats.eviction();

            if let RegisterOutcome::Conflict(_) = self.registry.register(handle.clone()).await {
                // Another connection won the slot between evict and
                // re-register.
                writer
                    .write_frame(&ServerFrame::error("already connected elsewhere"))
                    .await?;
                return Ok(None);
            }
        }

        state.on_authenticated(identity.clone(), room_key.as_str());

        // From here the session is visible to broadcasts. If the greeting
        // cannot be written the registry entry must not outlive us.
        if let Err(e) = self.send_greeting(writer, &identity.username, &room_key, room_id).await {
            self.registry.deregister(&handle).await;
            return Err(e);
        }

        Ok(Some(ActiveSession {
            handle,
            outbound,
            room_id,
        }))
    }

    /// Read frames until the `auth` frame, tolerating undecodable lines.
    async fn await_credentials(
        &self,
        reader: &mut FrameReader<OwnedReadHalf>,
    ) -> crate::Result<AuthAttempt> {
        loop {
            match reader.read_frame::<ClientFrame>().await {
                Ok(Some(ClientFrame::Auth { token, room })) => {
                    return Ok(AuthAttempt::Credentials { token, room });
                }
                Ok(Some(_)) => return Ok(AuthAttempt::WrongFrame),
                Ok(None) => return Ok(AuthAttempt::Disconnected),
                Err(crate::Error::Protocol(ProtocolError::Malformed(detail))) => {
                    tracing::warn!(
                        session_id = self.session_id,
                        detail = %detail,
                        "Discarding undecodable line before auth"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write `auth_success` then `message_history`, in that order.
    async fn send_greeting(
        &self,
        writer: &mut FrameWriter<OwnedWriteHalf>,
        username: &str,
        room_key: &str,
        room_id: i64,
    ) -> crate::Result<()> {
        writer
            .write_frame(&ServerFrame::AuthSuccess {
                user: username.to_string(),
                room: room_key.to_string(),
            })
            .await?;

        // A history fetch failure downgrades to an empty history; the
        // session itself survives.
        let history = match self
            .store
            .fetch_history(room_id, self.config.history_limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    session_id = self.session_id,
                    room = %room_key,
                    error = %e,
                    "Failed to fetch history"
                );
                Vec::new()
            }
        };
        writer
            .write_frame(&ServerFrame::MessageHistory { data: history })
            .await?;

        Ok(())
    }

    async fn on_send_message(&self, handle: &SessionHandle, room_id: i64, message: &str) {
        match self
            .broadcaster
            .publish_message(handle.room(), room_id, handle.identity(), message)
            .await
        {
            Ok(stored) => {
                tracing::trace!(
                    session_id = self.session_id,
                    message_id = stored.id,
                    "Message published"
                );
            }
            Err(PublishError::EmptyMessage) => {
                tracing::trace!(session_id = self.session_id, "Dropping empty message");
            }
            Err(PublishError::Store(e)) => {
                tracing::error!(
                    session_id = self.session_id,
                    room = %handle.room(),
                    error = %e,
                    "Failed to store message"
                );
                let _ = handle.send(ServerFrame::error("message could not be stored"));
            }
        }
    }
}

/// Drain the outbound queue onto the socket.
///
/// `force_disconnect` is terminal: it is flushed and then the socket is
/// shut down, which is how evictions and server shutdown actually end a
/// connection.
async fn write_loop(
    mut outbound: mpsc::UnboundedReceiver<ServerFrame>,
    mut writer: FrameWriter<OwnedWriteHalf>,
) -> crate::Result<()> {
    while let Some(frame) = outbound.recv().await {
        let terminal = matches!(frame, ServerFrame::ForceDisconnect { .. });
        writer.write_frame(&frame).await?;
        if terminal {
            break;
        }
    }
    writer.shutdown().await?;
    Ok(())
}
