//! Room registry implementation
//!
//! The central in-memory map of who is connected where. One coarse mutex
//! guards all rooms; every operation is a short map manipulation, and no
//! I/O ever happens under the lock. Broadcast paths work on snapshots taken
//! here and deliver outside the critical section.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::handle::SessionHandle;

/// Outcome of a registration attempt
#[derive(Debug)]
pub enum RegisterOutcome {
    /// The session is now the live session for its (room, user)
    Registered,
    /// Another live session holds the slot; nothing was mutated
    Conflict(SessionHandle),
}

/// Central registry of live sessions, keyed by room then username.
///
/// Invariant: at most one live session per (room, user). `register` refuses
/// duplicates; the caller decides whether to probe and evict. Rooms here
/// are runtime state only. Whether a room *exists* is the durable store's
/// question, answered before registration.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, HashMap<String, SessionHandle>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session as the live session for its (room, user).
    ///
    /// Atomic check-then-insert: on conflict the existing handle is returned
    /// unchanged and the registry is not mutated.
    pub async fn register(&self, handle: SessionHandle) -> RegisterOutcome {
        let mut rooms = self.rooms.lock().await;
        let members = rooms.entry(handle.room().to_string()).or_default();

        if let Some(existing) = members.get(handle.username()) {
            return RegisterOutcome::Conflict(existing.clone());
        }

        let (room, user, session_id) = (
            handle.room().to_string(),
            handle.username().to_string(),
            handle.session_id(),
        );
        members.insert(user.clone(), handle);
        tracing::info!(
            room = %room,
            user = %user,
            session_id = session_id,
            members = members.len(),
            "Session registered"
        );
        RegisterOutcome::Registered
    }

    /// Remove a stale entry so a subsequent `register` can succeed.
    ///
    /// Matches by session id, so a racing eviction of an already-replaced
    /// entry is a no-op. Never touches the session's transport; closing it
    /// is the caller's job, done outside this lock.
    pub async fn force_evict(&self, existing: &SessionHandle) -> bool {
        let mut rooms = self.rooms.lock().await;
        let removed = remove_entry(&mut rooms, existing);
        if removed {
            tracing::info!(
                room = %existing.room(),
                user = %existing.username(),
                session_id = existing.session_id(),
                "Session evicted"
            );
        } else {
            tracing::warn!(
                room = %existing.room(),
                user = %existing.username(),
                session_id = existing.session_id(),
                "Evict requested for a session no longer registered"
            );
        }
        removed
    }

    /// Remove a session. Idempotent: returns whether anything was removed,
    /// so racing cleanup paths can tell who actually did the work.
    pub async fn deregister(&self, handle: &SessionHandle) -> bool {
        let mut rooms = self.rooms.lock().await;
        let removed = remove_entry(&mut rooms, handle);
        if removed {
            tracing::debug!(
                room = %handle.room(),
                user = %handle.username(),
                session_id = handle.session_id(),
                "Session deregistered"
            );
        }
        removed
    }

    /// Point-in-time snapshot of a room's live sessions.
    ///
    /// Sessions may leave between snapshot and use; senders must tolerate
    /// closed handles.
    pub async fn members_of(&self, room: &str) -> Vec<SessionHandle> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Display names currently live in a room
    pub async fn users_of(&self, room: &str) -> Vec<String> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one live session
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Total live sessions across all rooms
    pub async fn session_count(&self) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.values().map(HashMap::len).sum()
    }

    /// Remove sessions whose outbound channel has closed without a normal
    /// cleanup, returning them so the caller can announce the departures.
    pub async fn sweep(&self) -> Vec<SessionHandle> {
        let mut rooms = self.rooms.lock().await;
        let mut reaped = Vec::new();

        for members in rooms.values_mut() {
            let dead: Vec<String> = members
                .iter()
                .filter(|(_, handle)| !handle.is_open())
                .map(|(user, _)| user.clone())
                .collect();
            for user in dead {
                if let Some(handle) = members.remove(&user) {
                    tracing::info!(
                        room = %handle.room(),
                        user = %handle.username(),
                        session_id = handle.session_id(),
                        "Dead session removed by sweep"
                    );
                    reaped.push(handle);
                }
            }
        }
        rooms.retain(|_, members| !members.is_empty());

        reaped
    }

    /// Remove and return every live session (server shutdown)
    pub async fn drain(&self) -> Vec<SessionHandle> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .drain()
            .flat_map(|(_, members)| members.into_values())
            .collect()
    }

    /// Spawn a background task sweeping dead sessions on an interval.
    ///
    /// Returns a handle that can be used to abort the task. `on_reaped` runs
    /// outside the registry lock for each removed session.
    pub fn spawn_cleanup_task<F>(
        self: &Arc<Self>,
        interval: std::time::Duration,
        on_reaped: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(SessionHandle) + Send + Sync + 'static,
    {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for handle in registry.sweep().await {
                    on_reaped(handle);
                }
            }
        })
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove `handle`'s entry iff it is still the registered session for its
/// (room, user). Empty rooms are dropped eagerly.
fn remove_entry(
    rooms: &mut HashMap<String, HashMap<String, SessionHandle>>,
    handle: &SessionHandle,
) -> bool {
    let Some(members) = rooms.get_mut(handle.room()) else {
        return false;
    };
    let matches = members
        .get(handle.username())
        .map(|current| current.session_id() == handle.session_id())
        .unwrap_or(false);
    if !matches {
        return false;
    }

    members.remove(handle.username());
    if members.is_empty() {
        rooms.remove(handle.room());
    }
    true
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use crate::auth::Identity;
    use crate::protocol::ServerFrame;

    use super::*;

    fn handle(
        session_id: u64,
        user: &str,
        room: &str,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(session_id, Identity::new(session_id as i64, user), room, tx);
        (handle, rx)
    }

    #[tokio::test]
    async fn test_register_and_snapshots() {
        let registry = RoomRegistry::new();
        let (alice, _rx_a) = handle(1, "alice", "lobby");
        let (bob, _rx_b) = handle(2, "bob", "lobby");

        assert!(matches!(
            registry.register(alice).await,
            RegisterOutcome::Registered
        ));
        assert!(matches!(
            registry.register(bob).await,
            RegisterOutcome::Registered
        ));

        assert_eq!(registry.members_of("lobby").await.len(), 2);
        let mut users = registry.users_of("lobby").await;
        users.sort();
        assert_eq!(users, vec!["alice", "bob"]);

        assert_eq!(registry.room_count().await, 1);
        assert_eq!(registry.session_count().await, 2);
        assert!(registry.members_of("elsewhere").await.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_leaves_state_untouched() {
        let registry = RoomRegistry::new();
        let (first, _rx1) = handle(1, "alice", "lobby");
        let (second, _rx2) = handle(2, "alice", "lobby");

        registry.register(first).await;

        match registry.register(second.clone()).await {
            RegisterOutcome::Conflict(existing) => assert_eq!(existing.session_id(), 1),
            RegisterOutcome::Registered => panic!("duplicate registration accepted"),
        }

        // Still exactly one entry, still the original
        let members = registry.members_of("lobby").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].session_id(), 1);

        // And the conflict is repeatable
        assert!(matches!(
            registry.register(second).await,
            RegisterOutcome::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_force_evict_then_register() {
        let registry = RoomRegistry::new();
        let (old, _rx_old) = handle(1, "alice", "lobby");
        let (new, _rx_new) = handle(2, "alice", "lobby");

        registry.register(old).await;
        let existing = match registry.register(new.clone()).await {
            RegisterOutcome::Conflict(existing) => existing,
            RegisterOutcome::Registered => panic!("expected conflict"),
        };

        assert!(registry.force_evict(&existing).await);
        assert!(matches!(
            registry.register(new).await,
            RegisterOutcome::Registered
        ));

        let members = registry.members_of("lobby").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].session_id(), 2);
    }

    #[tokio::test]
    async fn test_force_evict_stale_handle_is_noop() {
        let registry = RoomRegistry::new();
        let (old, _rx_old) = handle(1, "alice", "lobby");
        let (new, _rx_new) = handle(2, "alice", "lobby");

        registry.register(new).await;

        // Evicting with a handle that was already replaced must not remove
        // the replacement
        assert!(!registry.force_evict(&old).await);
        let members = registry.members_of("lobby").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].session_id(), 2);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = RoomRegistry::new();
        let (alice, _rx_a) = handle(1, "alice", "lobby");
        let (bob, _rx_b) = handle(2, "bob", "lobby");

        registry.register(alice.clone()).await;
        registry.register(bob).await;

        assert!(registry.deregister(&alice).await);
        assert!(!registry.deregister(&alice).await);
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_deregister_removes_empty_room() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = handle(1, "alice", "lobby");

        registry.register(alice.clone()).await;
        assert_eq!(registry.room_count().await, 1);

        registry.deregister(&alice).await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_point_in_time() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = handle(1, "alice", "lobby");
        registry.register(alice.clone()).await;

        let snapshot = registry.members_of("lobby").await;
        registry.deregister(&alice).await;

        // The copy is unaffected; the registry has moved on
        assert_eq!(snapshot.len(), 1);
        assert!(registry.members_of("lobby").await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_reaps_closed_sessions() {
        let registry = RoomRegistry::new();
        let (alice, rx_a) = handle(1, "alice", "lobby");
        let (bob, _rx_b) = handle(2, "bob", "lobby");
        let (carol, rx_c) = handle(3, "carol", "attic");

        registry.register(alice).await;
        registry.register(bob).await;
        registry.register(carol).await;

        drop(rx_a);
        drop(rx_c);

        let mut reaped: Vec<u64> = registry
            .sweep()
            .await
            .iter()
            .map(SessionHandle::session_id)
            .collect();
        reaped.sort_unstable();
        assert_eq!(reaped, vec![1, 3]);

        // bob survives; carol's room is gone entirely
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_drain_empties_registry() {
        let registry = RoomRegistry::new();
        let (alice, _rx_a) = handle(1, "alice", "lobby");
        let (carol, _rx_c) = handle(3, "carol", "attic");

        registry.register(alice).await;
        registry.register(carol).await;

        let drained = registry.drain().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.room_count().await, 0);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_register_single_winner() {
        let registry = Arc::new(RoomRegistry::new());

        let mut tasks = Vec::new();
        for session_id in 1..=8u64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (tx, rx) = mpsc::unbounded_channel();
                let handle =
                    SessionHandle::new(session_id, Identity::new(7, "alice"), "lobby", tx);
                let outcome = registry.register(handle).await;
                // Keep the channel alive so winners stay probe-able
                (outcome, rx)
            }));
        }

        let mut registered = 0;
        let mut conflicts = 0;
        let mut receivers = Vec::new();
        for task in tasks {
            let (outcome, rx) = task.await.unwrap();
            receivers.push(rx);
            match outcome {
                RegisterOutcome::Registered => registered += 1,
                RegisterOutcome::Conflict(_) => conflicts += 1,
            }
        }

        assert_eq!(registered, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(registry.members_of("lobby").await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_deregister_single_removal() {
        let registry = Arc::new(RoomRegistry::new());
        let (alice, _rx_alice) = handle(1, "alice", "lobby");
        let (bob, _rx_bob) = handle(2, "bob", "lobby");

        registry.register(alice.clone()).await;
        registry.register(bob).await;

        // Driver teardown, broadcast pruning, and the sweeper can all
        // race to close the same session; exactly one may remove it.
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let victim = alice.clone();
            tasks.push(tokio::spawn(
                async move { registry.deregister(&victim).await },
            ));
        }

        let mut removals = 0;
        for task in tasks {
            if task.await.unwrap() {
                removals += 1;
            }
        }

        assert_eq!(removals, 1);
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.users_of("lobby").await, vec!["bob"]);
    }
}
