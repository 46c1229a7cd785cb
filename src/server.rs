//! WebSocket relay server.
//!
//! Architecture:
//! ```text
//! Client A ──┐                      ┌── user:<id> (personal channel)
//!             ├── RelayServer ── Relay ── live:<id> (stream rooms)
//! Client B ──┘        │
//!                     ├── ConnectionRegistry (identity + outboxes)
//!                     ├── RoomDirectory (membership)
//!                     ├── EventRouter (delivery rules)
//!                     └── DisconnectSweeper (cleanup + presence)
//! ```
//!
//! Each accepted connection gets its own task: a `tokio::select!` loop that
//! alternates between inbound frames (decoded and handed to the router) and
//! the connection's outbox (rendered frames queued by fan-out, written to
//! the socket). The outbox is unbounded, so routing never blocks on a slow
//! recipient; the recipient's own task drains at whatever pace its socket
//! allows. When the transport closes — cleanly or not — the sweeper runs
//! once and presence is recomputed for every room the connection occupied.

use std::net::SocketAddr;
use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::ClientEvent;
use crate::relay::Relay;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_events: u64,
    pub malformed_events: u64,
    pub active_rooms: usize,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    stats: Arc<RwLock<RelayStats>>,
}

impl RelayServer {
    /// Create a new relay server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            relay: Arc::new(Relay::new()),
            stats: Arc::new(RwLock::new(RelayStats::default())),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Bind the configured address and serve connections forever.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Relay server listening on {}", self.config.bind_addr);
        self.run_on(listener).await
    }

    /// Serve connections on an already-bound listener.
    pub async fn run_on(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let relay = self.relay.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, relay, stats).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection until it closes.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        relay: Arc<Relay>,
        stats: Arc<RwLock<RelayStats>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        log::info!("WebSocket connection established from {addr}");

        let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Arc<str>>();
        let conn = relay.registry.register(outbox).await;

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        loop {
            tokio::select! {
                // Inbound frame from the client
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match ClientEvent::decode(text.as_str()) {
                                Ok(event) => {
                                    {
                                        let mut s = stats.write().await;
                                        s.total_events += 1;
                                    }
                                    relay.router.dispatch(conn, event).await;
                                }
                                Err(e) => {
                                    // Malformed frames are dropped, never fatal
                                    log::warn!("Discarding bad frame from {addr}: {e}");
                                    let mut s = stats.write().await;
                                    s.malformed_events += 1;
                                }
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("Connection closed from {addr}");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if ws_sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }

                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }

                // Outbound frame queued by the router or presence counter
                frame = outbox_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if ws_sender
                                .send(Message::Text(frame.to_string().into()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // Cleanup must run on every exit path above, hence break-not-return.
        relay.sweeper.sweep(conn).await;

        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
            s.active_rooms = relay.rooms.room_count().await;
        }

        Ok(())
    }

    /// Get server statistics.
    pub async fn stats(&self) -> RelayStats {
        let mut stats = self.stats.read().await.clone();
        stats.active_rooms = self.relay.rooms.room_count().await;
        stats
    }

    /// The relay instance this server routes through.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
    }

    #[test]
    fn test_server_creation() {
        let server = RelayServer::with_defaults();
        assert_eq!(server.bind_addr(), "127.0.0.1:5000");
    }

    #[test]
    fn test_server_custom_config() {
        let config = ServerConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
        };
        let server = RelayServer::new(config);
        assert_eq!(server.bind_addr(), "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn test_server_stats_initial() {
        let server = RelayServer::with_defaults();
        let stats = server.stats().await;
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.malformed_events, 0);
        assert_eq!(stats.active_rooms, 0);
    }
}
