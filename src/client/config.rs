//! Client configuration

use std::time::Duration;

use crate::protocol::MAX_FRAME_BYTES;

/// Client connection options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address as `host:port`
    pub server_addr: String,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Upper bound on a single inbound frame
    pub max_frame_bytes: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl ClientConfig {
    /// Create a config pointing at `server_addr` (`host:port`)
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            connect_timeout: Duration::from_secs(10),
            max_frame_bytes: MAX_FRAME_BYTES,
            tcp_nodelay: true,
        }
    }

    /// Set the TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-frame size limit
    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = ClientConfig::new("127.0.0.1:7667");

        assert_eq!(config.server_addr, "127.0.0.1:7667");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_frame_bytes, MAX_FRAME_BYTES);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientConfig::new("chat.example.com:7667")
            .connect_timeout(Duration::from_secs(3))
            .max_frame_bytes(8 * 1024);

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.max_frame_bytes, 8 * 1024);
    }
}
