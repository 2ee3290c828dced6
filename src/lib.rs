//! Room-based chat server library
//!
//! A TCP chat service speaking one JSON frame per line. A client
//! authenticates with a signed token, joins exactly one room for the life
//! of its connection, and exchanges messages that are durably stored
//! before anyone sees them.
//!
//! # Architecture
//!
//! ```text
//!   TCP accept                ChatServer
//!       │                        │
//!       ▼                        ▼
//!   connection task ──► handshake: verify token, resolve room,
//!       │                register in RoomRegistry (one live
//!       │                session per room+user)
//!       │
//!       ├─ reader: client frames ──► Broadcaster.publish_message
//!       │                             │ 1. ChatStore.append_message
//!       │                             │ 2. fan out to room members
//!       └─ writer task ◄── outbound queue ◄─────────┘
//! ```
//!
//! The [`ChatStore`](store::ChatStore) and
//! [`TokenVerifier`](auth::TokenVerifier) seams are trait objects, so
//! deployments bring their own database and credential service;
//! [`MemoryStore`](store::MemoryStore) and
//! [`JwtVerifier`](auth::JwtVerifier) cover tests, demos and small
//! installations.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use roomcast::auth::JwtVerifier;
//! use roomcast::store::{ChatStore, MemoryStore};
//! use roomcast::{ChatServer, ServerConfig};
//!
//! # async fn example() -> roomcast::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let alice = store.add_user("alice").await;
//! store.create_room("lobby", alice, None).await?;
//!
//! let verifier = Arc::new(JwtVerifier::new(b"secret"));
//! let server = ChatServer::new(ServerConfig::default(), verifier, store);
//! server.run().await
//! # }
//! ```

pub mod auth;
pub mod broadcast;
pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;

pub use client::{ChatClient, ClientConfig};
pub use error::{Error, Result};
pub use server::{ChatServer, ServerConfig};
