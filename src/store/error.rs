//! Store error types

/// Error type for durable store operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No room with this id
    RoomNotFound(i64),
    /// Room key already taken
    RoomExists(String),
    /// No user with this id
    UserNotFound(i64),
    /// Backend unavailable or a query failed
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::RoomNotFound(id) => write!(f, "Room not found: {}", id),
            StoreError::RoomExists(key) => write!(f, "Room already exists: {}", key),
            StoreError::UserNotFound(id) => write!(f, "User not found: {}", id),
            StoreError::Unavailable(detail) => write!(f, "Store unavailable: {}", detail),
        }
    }
}

impl std::error::Error for StoreError {}
