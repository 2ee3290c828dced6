//! Durable store contract
//!
//! Persistence for rooms and messages lives behind [`ChatStore`]; the
//! realtime core consumes it and never talks to a database directly. The
//! contract the core relies on:
//!
//! - `append_message` is atomic and assigns a monotonically increasing
//!   per-room ordering key; its return value is the canonical form that gets
//!   fanned out.
//! - `fetch_history` returns the most recent `limit` rows, oldest first, in
//!   the store's insertion order. That order is authoritative.
//! - The store serializes its own writes; callers add no extra locking.
//!
//! [`MemoryStore`] is the reference implementation used by tests and demos.

pub mod error;
pub mod memory;
pub mod message;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use message::{RoomInfo, StoredMessage};

/// Interface to the durable room/message store
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Whether a room with this key exists
    async fn room_exists(&self, room_key: &str) -> Result<bool, StoreError>;

    /// Resolve a room key to its id
    async fn get_room_id(&self, room_key: &str) -> Result<Option<i64>, StoreError>;

    /// Create a room. A `Some` access secret makes the room private.
    async fn create_room(
        &self,
        room_key: &str,
        created_by: i64,
        access_secret: Option<&str>,
    ) -> Result<i64, StoreError>;

    /// All rooms, in creation order
    async fn list_rooms(&self) -> Result<Vec<RoomInfo>, StoreError>;

    /// Durably write a message and return its canonical stored form
    async fn append_message(
        &self,
        room_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<StoredMessage, StoreError>;

    /// The most recent `limit` messages, oldest first
    async fn fetch_history(&self, room_id: i64, limit: usize)
        -> Result<Vec<StoredMessage>, StoreError>;

    /// Number of messages stored for a room
    async fn message_count(&self, room_id: i64) -> Result<usize, StoreError>;
}
