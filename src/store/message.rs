//! Persisted row types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in its canonical, store-assigned form.
///
/// `id` is the ordering key: the store assigns it monotonically, and history
/// retrieval returns rows in `id` order. The core never reorders messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub user_id: i64,
    /// Display name of the author at write time
    pub author_name: String,
    pub content: String,
    /// Server-assigned creation time
    pub timestamp: DateTime<Utc>,
}

/// A room row.
///
/// Rooms are immutable once created. A private room always has an access
/// secret; a public room never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: i64,
    /// Unique human-chosen room key
    pub key: String,
    /// User id of the creator
    pub created_by: i64,
    pub private: bool,
}
