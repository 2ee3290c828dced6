//! Wire frame types
//!
//! Every frame is one JSON object tagged by `type`. Inbound and outbound
//! directions use separate enums so each side only ever parses what it can
//! legally receive.

use serde::{Deserialize, Serialize};

use crate::store::StoredMessage;

/// Frames a client may send to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Authentication handshake; must be the first frame on a connection
    Auth { token: String, room: String },
    /// Publish a chat message to the session's room
    SendMessage { message: String },
    /// Liveness check; the server answers with `pong`
    Ping,
}

/// Frames the server may send to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Handshake accepted; always followed by `message_history`
    AuthSuccess { user: String, room: String },
    /// Structured failure notice
    Error { message: String },
    /// Recent room history, oldest first
    MessageHistory { data: Vec<StoredMessage> },
    /// A message that was durably stored and is now being fanned out
    NewMessage { data: StoredMessage },
    /// Another user joined the room
    UserJoined { data: Announcement },
    /// Another user left the room
    UserLeft { data: Announcement },
    /// Answer to a client `ping`
    Pong,
    /// The server is closing this connection deliberately
    ForceDisconnect { message: String },
}

/// Payload of join/leave notices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// Display name of the user the notice is about
    pub username: String,
    /// Human-readable notice text
    pub message: String,
}

impl ServerFrame {
    /// Build an `error` notice
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }

    /// Build a `user_joined` notice for `username`
    pub fn user_joined(username: &str) -> Self {
        ServerFrame::UserJoined {
            data: Announcement {
                username: username.to_string(),
                message: format!("{} joined the room", username),
            },
        }
    }

    /// Build a `user_left` notice for `username`
    pub fn user_left(username: &str) -> Self {
        ServerFrame::UserLeft {
            data: Announcement {
                username: username.to_string(),
                message: format!("{} left the room", username),
            },
        }
    }

    /// Build a `force_disconnect` notice
    pub fn force_disconnect(message: impl Into<String>) -> Self {
        ServerFrame::ForceDisconnect {
            message: message.into(),
        }
    }

    /// The frame's wire tag, for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::AuthSuccess { .. } => "auth_success",
            ServerFrame::Error { .. } => "error",
            ServerFrame::MessageHistory { .. } => "message_history",
            ServerFrame::NewMessage { .. } => "new_message",
            ServerFrame::UserJoined { .. } => "user_joined",
            ServerFrame::UserLeft { .. } => "user_left",
            ServerFrame::Pong => "pong",
            ServerFrame::ForceDisconnect { .. } => "force_disconnect",
        }
    }
}
