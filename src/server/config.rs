//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::{DEFAULT_PORT, MAX_FRAME_BYTES};

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Handshake timeout (the `auth` frame must arrive within this time)
    pub handshake_timeout: Duration,

    /// How many history messages a fresh session receives
    pub history_limit: usize,

    /// Upper bound on a single wire frame
    pub max_frame_bytes: usize,

    /// How often dead sessions are swept from the registry
    pub cleanup_interval: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            history_limit: 50,
            max_frame_bytes: MAX_FRAME_BYTES,
            cleanup_interval: Duration::from_secs(30),
            tcp_nodelay: true, // Chat frames are small and latency-sensitive
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set how much room history a joining session is sent
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set the per-frame size limit
    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Set the dead-session sweep interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.max_frame_bytes, MAX_FRAME_BYTES);
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:7700".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 7700);
    }

    #[test]
    fn test_builder_bind() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        let config = ServerConfig::default().bind(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_max_connections() {
        let config = ServerConfig::default().max_connections(100);

        assert_eq!(config.max_connections, 100);
    }

    #[test]
    fn test_builder_handshake_timeout() {
        let config = ServerConfig::default().handshake_timeout(Duration::from_secs(3));

        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_builder_history_limit() {
        let config = ServerConfig::default().history_limit(200);

        assert_eq!(config.history_limit, 200);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:7667".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .handshake_timeout(Duration::from_secs(5))
            .history_limit(10)
            .max_frame_bytes(16 * 1024)
            .cleanup_interval(Duration::from_secs(60));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.max_frame_bytes, 16 * 1024);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }
}
