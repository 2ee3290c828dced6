//! In-memory reference store
//!
//! Implements the full [`ChatStore`] contract with no external backend, for
//! tests and self-contained deployments. A single mutex serializes writes,
//! which also provides the per-room monotonic ordering the contract
//! requires.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;

use super::error::StoreError;
use super::message::{RoomInfo, StoredMessage};
use super::ChatStore;

#[derive(Debug, Default)]
struct Inner {
    /// user id -> display name
    users: HashMap<i64, String>,
    rooms: Vec<RoomRow>,
    /// room id -> messages in insertion order
    messages: HashMap<i64, Vec<StoredMessage>>,
    next_user_id: i64,
    next_room_id: i64,
    next_message_id: i64,
}

#[derive(Debug)]
struct RoomRow {
    info: RoomInfo,
    /// Held for the join surface; the realtime core never reads it
    #[allow(dead_code)]
    access_secret: Option<String>,
}

/// In-memory [`ChatStore`] implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so `append_message` can resolve their display name.
    ///
    /// User management belongs to the credential service; this mirrors just
    /// enough of its users table to satisfy the store contract.
    pub async fn add_user(&self, username: &str) -> i64 {
        let mut inner = self.inner.lock().await;
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        inner.users.insert(id, username.to_string());
        id
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryStore {
    async fn room_exists(&self, room_key: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rooms.iter().any(|r| r.info.key == room_key))
    }

    async fn get_room_id(&self, room_key: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rooms
            .iter()
            .find(|r| r.info.key == room_key)
            .map(|r| r.info.id))
    }

    async fn create_room(
        &self,
        room_key: &str,
        created_by: i64,
        access_secret: Option<&str>,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.rooms.iter().any(|r| r.info.key == room_key) {
            return Err(StoreError::RoomExists(room_key.to_string()));
        }

        inner.next_room_id += 1;
        let id = inner.next_room_id;
        inner.rooms.push(RoomRow {
            info: RoomInfo {
                id,
                key: room_key.to_string(),
                created_by,
                private: access_secret.is_some(),
            },
            access_secret: access_secret.map(str::to_string),
        });
        inner.messages.insert(id, Vec::new());
        Ok(id)
    }

    async fn list_rooms(&self) -> Result<Vec<RoomInfo>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rooms.iter().map(|r| r.info.clone()).collect())
    }

    async fn append_message(
        &self,
        room_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let mut inner = self.inner.lock().await;
        let author_name = inner
            .users
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::UserNotFound(user_id))?;
        if !inner.messages.contains_key(&room_id) {
            return Err(StoreError::RoomNotFound(room_id));
        }

        inner.next_message_id += 1;
        let message = StoredMessage {
            id: inner.next_message_id,
            user_id,
            author_name,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        inner
            .messages
            .get_mut(&room_id)
            .ok_or(StoreError::RoomNotFound(room_id))?
            .push(message.clone());
        Ok(message)
    }

    async fn fetch_history(
        &self,
        room_id: i64,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.lock().await;
        let rows = inner
            .messages
            .get(&room_id)
            .ok_or(StoreError::RoomNotFound(room_id))?;
        let skip = rows.len().saturating_sub(limit);
        Ok(rows[skip..].to_vec())
    }

    async fn message_count(&self, room_id: i64) -> Result<usize, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .messages
            .get(&room_id)
            .map(Vec::len)
            .ok_or(StoreError::RoomNotFound(room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_lookup_room() {
        let store = MemoryStore::new();
        let creator = store.add_user("alice").await;

        let id = store.create_room("lobby", creator, None).await.unwrap();

        assert!(store.room_exists("lobby").await.unwrap());
        assert!(!store.room_exists("other").await.unwrap());
        assert_eq!(store.get_room_id("lobby").await.unwrap(), Some(id));
        assert_eq!(store.get_room_id("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_room_rejected() {
        let store = MemoryStore::new();
        let creator = store.add_user("alice").await;

        store.create_room("lobby", creator, None).await.unwrap();
        let err = store.create_room("lobby", creator, None).await.unwrap_err();
        assert_eq!(err, StoreError::RoomExists("lobby".to_string()));
    }

    #[tokio::test]
    async fn test_private_flag_follows_secret() {
        let store = MemoryStore::new();
        let creator = store.add_user("alice").await;

        store.create_room("open", creator, None).await.unwrap();
        store
            .create_room("vault", creator, Some("hunter2"))
            .await
            .unwrap();

        let rooms = store.list_rooms().await.unwrap();
        assert_eq!(rooms.len(), 2);
        assert!(!rooms.iter().find(|r| r.key == "open").unwrap().private);
        assert!(rooms.iter().find(|r| r.key == "vault").unwrap().private);
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_ids() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let room = store.create_room("lobby", alice, None).await.unwrap();

        let m1 = store.append_message(room, alice, "one").await.unwrap();
        let m2 = store.append_message(room, alice, "two").await.unwrap();
        let m3 = store.append_message(room, alice, "three").await.unwrap();

        assert!(m1.id < m2.id && m2.id < m3.id);
        assert_eq!(m1.author_name, "alice");
        assert_eq!(store.message_count(room).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_append_unknown_user_or_room() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let room = store.create_room("lobby", alice, None).await.unwrap();

        assert_eq!(
            store.append_message(room, 999, "x").await.unwrap_err(),
            StoreError::UserNotFound(999)
        );
        assert_eq!(
            store.append_message(999, alice, "x").await.unwrap_err(),
            StoreError::RoomNotFound(999)
        );
    }

    #[tokio::test]
    async fn test_history_window_is_newest_oldest_first() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let room = store.create_room("lobby", alice, None).await.unwrap();

        for text in ["a", "b", "c", "d", "e"] {
            store.append_message(room, alice, text).await.unwrap();
        }

        let window = store.fetch_history(room, 3).await.unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "d", "e"]);

        let all = store.fetch_history(room, 50).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all.first().unwrap().content, "a");

        assert!(store.fetch_history(room, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_order_is_store_assigned() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let room = store.create_room("lobby", alice, None).await.unwrap();

        // Two writers interleaving; insertion order is what history reports
        store.append_message(room, alice, "hello").await.unwrap();
        store.append_message(room, bob, "world").await.unwrap();

        let history = store.fetch_history(room, 10).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "world"]);
    }
}
