//! TCP chat server
//!
//! The listener accepts connections and spawns one driver task per
//! socket; drivers share the room registry and broadcaster through the
//! [`ChatServer`].

pub mod config;
mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::ChatServer;
