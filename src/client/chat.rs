//! Chat client
//!
//! High-level client for the newline-delimited JSON chat protocol:
//! connect, authenticate into a room, then exchange frames.

use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{ClientFrame, FrameReader, FrameWriter, ServerFrame};
use crate::store::StoredMessage;

use super::config::ClientConfig;

/// What the server sends back for an accepted handshake
#[derive(Debug, Clone)]
pub struct Greeting {
    /// Username the server authenticated us as
    pub user: String,
    /// Room we joined
    pub room: String,
    /// Recent room history, oldest first
    pub history: Vec<StoredMessage>,
}

/// Chat client over one TCP connection
///
/// # Example
/// ```no_run
/// use roomcast::client::{ChatClient, ClientConfig};
///
/// # async fn example(token: &str) -> roomcast::Result<()> {
/// let config = ClientConfig::new("127.0.0.1:7667");
/// let mut client = ChatClient::connect(config).await?;
///
/// let greeting = client.authenticate(token, "lobby").await?;
/// println!("joined {} as {}", greeting.room, greeting.user);
///
/// client.send_message("hello!").await?;
/// while let Some(frame) = client.next_frame().await? {
///     println!("{:?}", frame);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChatClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl ChatClient {
    /// Open a TCP connection to the server.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let socket = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(&config.server_addr),
        )
        .await
        .map_err(|_| connect_timeout(config.connect_timeout))??;

        if config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        let (read_half, write_half) = socket.into_split();
        Ok(Self {
            reader: FrameReader::with_limit(read_half, config.max_frame_bytes),
            writer: FrameWriter::new(write_half),
        })
    }

    /// Authenticate into `room`.
    ///
    /// Must be the first exchange on the connection. On success the server
    /// replies `auth_success` followed by `message_history`; both are
    /// consumed here. A server `error` frame comes back as
    /// [`ProtocolError::Rejected`].
    pub async fn authenticate(&mut self, token: &str, room: &str) -> Result<Greeting> {
        self.writer
            .write_frame(&ClientFrame::Auth {
                token: token.to_string(),
                room: room.to_string(),
            })
            .await?;

        let (user, room) = match self.expect_frame().await? {
            ServerFrame::AuthSuccess { user, room } => (user, room),
            ServerFrame::Error { message } => {
                return Err(ProtocolError::Rejected(message).into());
            }
            ServerFrame::ForceDisconnect { message } => {
                return Err(ProtocolError::Rejected(message).into());
            }
            other => {
                return Err(ProtocolError::UnexpectedFrame(other.kind().to_string()).into());
            }
        };

        let history = match self.expect_frame().await? {
            ServerFrame::MessageHistory { data } => data,
            other => {
                return Err(ProtocolError::UnexpectedFrame(other.kind().to_string()).into());
            }
        };

        Ok(Greeting {
            user,
            room,
            history,
        })
    }

    /// Send a chat message to the joined room.
    pub async fn send_message(&mut self, message: &str) -> Result<()> {
        self.writer
            .write_frame(&ClientFrame::SendMessage {
                message: message.to_string(),
            })
            .await
    }

    /// Send a liveness probe; the server answers with `pong`.
    pub async fn ping(&mut self) -> Result<()> {
        self.writer.write_frame(&ClientFrame::Ping).await
    }

    /// Read the next server frame. `None` means the server closed the
    /// connection.
    pub async fn next_frame(&mut self) -> Result<Option<ServerFrame>> {
        self.reader.read_frame().await
    }

    /// Close the write half. The server sees EOF and tears the session
    /// down.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    /// Split into independently usable read and write halves, for reading
    /// broadcasts concurrently with sending.
    pub fn into_split(self) -> (ChatReader, ChatWriter) {
        (
            ChatReader {
                reader: self.reader,
            },
            ChatWriter {
                writer: self.writer,
            },
        )
    }

    async fn expect_frame(&mut self) -> Result<ServerFrame> {
        match self.reader.read_frame().await? {
            Some(frame) => Ok(frame),
            None => Err(ProtocolError::ConnectionClosed.into()),
        }
    }
}

/// Read half of a split [`ChatClient`]
pub struct ChatReader {
    reader: FrameReader<OwnedReadHalf>,
}

impl ChatReader {
    /// Read the next server frame. `None` means the server closed the
    /// connection.
    pub async fn next_frame(&mut self) -> Result<Option<ServerFrame>> {
        self.reader.read_frame().await
    }
}

/// Write half of a split [`ChatClient`]
pub struct ChatWriter {
    writer: FrameWriter<OwnedWriteHalf>,
}

impl ChatWriter {
    /// Send a chat message to the joined room.
    pub async fn send_message(&mut self, message: &str) -> Result<()> {
        self.writer
            .write_frame(&ClientFrame::SendMessage {
                message: message.to_string(),
            })
            .await
    }

    /// Send a liveness probe.
    pub async fn ping(&mut self) -> Result<()> {
        self.writer.write_frame(&ClientFrame::Ping).await
    }

    /// Close the write half.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }
}

fn connect_timeout(after: Duration) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("connect timed out after {:?}", after),
    ))
}
