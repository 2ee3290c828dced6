//! Crate-level error types
//!
//! Module-specific errors (auth, store, registry, broadcast) live next to
//! their modules; this is the top-level type that server and client entry
//! points return.

use crate::store::StoreError;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for server and client operations
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure
    Io(std::io::Error),
    /// Wire protocol violation
    Protocol(ProtocolError),
    /// Durable store failure
    Store(StoreError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Store(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

/// Wire-level protocol errors
#[derive(Debug, Clone)]
pub enum ProtocolError {
    /// Peer closed the connection mid-handshake
    ConnectionClosed,
    /// A line arrived that is not a valid frame
    Malformed(String),
    /// A line exceeded the configured frame size limit
    Oversized(usize),
    /// The server refused the handshake
    Rejected(String),
    /// A valid frame arrived where a different one was required
    UnexpectedFrame(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::ConnectionClosed => write!(f, "Connection closed during handshake"),
            ProtocolError::Malformed(detail) => write!(f, "Malformed frame: {}", detail),
            ProtocolError::Oversized(limit) => {
                write!(f, "Frame exceeds {} byte limit", limit)
            }
            ProtocolError::Rejected(message) => write!(f, "Handshake rejected: {}", message),
            ProtocolError::UnexpectedFrame(got) => {
                write!(f, "Unexpected frame: {}", got)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
