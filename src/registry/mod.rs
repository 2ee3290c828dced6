//! Room registry: who is live in which room
//!
//! The registry is the only state shared between connection tasks. It maps
//! each room to its live sessions and enforces the central invariant: at
//! most one live session per (room, user) at any instant.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<RoomRegistry>
//!                  ┌───────────────────────────────┐
//!                  │ rooms: HashMap<room,          │
//!                  │   HashMap<username,           │
//!                  │     SessionHandle {           │
//!                  │       session_id, identity,   │
//!                  │       outbound: mpsc::Sender, │
//!                  │     }                         │
//!                  │   >                           │
//!                  │ >                             │
//!                  └──────────────┬────────────────┘
//!                                 │ members_of() snapshot
//!                 ┌───────────────┼───────────────┐
//!                 ▼               ▼               ▼
//!            [Session A]     [Session B]     [Session C]
//!            handle.send()   handle.send()   handle.send()
//!                 │               │               │
//!                 └──► writer task ──► FrameWriter ──► TCP
//! ```
//!
//! # Locking
//!
//! One mutex guards all rooms. Every operation is a short map manipulation;
//! I/O never happens under the lock. Fan-out works on snapshots and
//! delivers through each handle's channel after the lock is released.

pub mod error;
pub mod handle;
pub mod store;

pub use error::RegistryError;
pub use handle::SessionHandle;
pub use store::{RegisterOutcome, RoomRegistry};
