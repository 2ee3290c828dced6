//! Chat server listener
//!
//! Handles the TCP accept loop and spawns a driver task per connection.
//! All connections share one registry, one broadcaster and one stats
//! block; the token verifier and store are injected so deployments can
//! bring their own credential service and database.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::auth::TokenVerifier;
use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::protocol::ServerFrame;
use crate::registry::RoomRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::{ServerStats, StatsSnapshot};
use crate::store::ChatStore;

/// Room chat server
pub struct ChatServer {
    config: ServerConfig,
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn ChatStore>,
    registry: Arc<RoomRegistry>,
    broadcaster: Arc<Broadcaster>,
    stats: Arc<ServerStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl ChatServer {
    /// Create a new server with the given configuration, token verifier
    /// and store
    pub fn new(
        config: ServerConfig,
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn ChatStore>,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let registry = Arc::new(RoomRegistry::new());
        let stats = Arc::new(ServerStats::new());
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&stats),
        ));

        Self {
            config,
            verifier,
            store,
            registry,
            broadcaster,
            stats,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the room registry
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Get a reference to the broadcaster
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Server counters plus live registry gauges
    pub async fn stats(&self) -> StatsSnapshot {
        let mut snap = self.stats.snapshot();
        snap.active_rooms = self.registry.room_count().await as u64;
        snap.active_sessions = self.registry.session_count().await as u64;
        snap
    }

    /// Run the server
    ///
    /// This method blocks for the life of the process.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Chat server listening");

        let _cleanup_handle = self.spawn_cleanup_task();

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Chat server listening");
        self.serve(listener, shutdown).await
    }

    /// Accept connections on an already-bound listener until `shutdown`
    /// resolves, then notify every live session and let it tear down.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let cleanup_handle = self.spawn_cleanup_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        cleanup_handle.abort();

        // A force_disconnect is terminal for a session's writer, so each
        // notified connection flushes it and tears itself down.
        let drained = self.registry.drain().await;
        if !drained.is_empty() {
            tracing::info!(sessions = drained.len(), "Disconnecting live sessions");
            for handle in &drained {
                let _ = handle.send(ServerFrame::force_disconnect("Server shutting down"));
            }
        }

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(
            session_id,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.verifier),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.stats),
        );
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            // The permit rides along for the connection's whole life.
            let _permit = permit;
            stats.connection_opened();

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            stats.connection_closed();
            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Sweep dead sessions periodically and announce each departure to
    /// the room it was swept from.
    fn spawn_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        let broadcaster = Arc::clone(&self.broadcaster);
        self.registry
            .spawn_cleanup_task(self.config.cleanup_interval, move |handle| {
                let broadcaster = Arc::clone(&broadcaster);
                tokio::spawn(async move {
                    broadcaster.announce_leave(&handle).await;
                });
            })
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
