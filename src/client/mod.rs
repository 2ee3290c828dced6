//! Chat client implementation
//!
//! Provides a client for the chat protocol:
//! - Joining a room with a signed token
//! - Sending messages and receiving room broadcasts
//!
//! Used by the tests and the demo binaries; also usable for bots and
//! smoke checks against a live server.

pub mod chat;
pub mod config;

pub use chat::{ChatClient, ChatReader, ChatWriter, Greeting};
pub use config::ClientConfig;
