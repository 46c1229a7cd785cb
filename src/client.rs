//! WebSocket client for the relay.
//!
//! Thin wrapper used by embedding applications and the integration tests:
//! connect, identify, emit events, and consume decoded [`ServerEvent`]s
//! through an mpsc channel. Reading and writing run on background tasks so
//! the caller never touches the socket directly.

use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientEvent, ProtocolError, ServerEvent};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events surfaced to the application.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Connection established
    Connected,
    /// Connection lost
    Disconnected,
    /// A relay event addressed to this connection
    Event(ServerEvent),
}

/// The relay client.
pub struct RelayClient {
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Channel to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<String>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::Receiver<RelayEvent>>,

    /// Event sender (held by the reader task)
    event_tx: mpsc::Sender<RelayEvent>,

    /// Server URL
    server_url: String,
}

impl RelayClient {
    /// Create a new client for the given `ws://` URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<RelayEvent>> {
        self.event_rx.take()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Connect to the relay.
    ///
    /// Spawns background tasks for reading and writing WebSocket frames.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_result = tokio_tungstenite::connect_async(&self.server_url).await;
        let (ws_stream, _) = match ws_result {
            Ok(ok) => ok,
            Err(e) => {
                log::error!("Failed to connect to {}: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };

        let (ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward the outgoing channel to the socket
        let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
        self.outgoing_tx = Some(out_tx);
        let writer = Arc::new(Mutex::new(ws_writer));
        let w = writer.clone();
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let mut writer = w.lock().await;
                if writer.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            // Channel closed: say goodbye if the socket is still up
            let mut writer = w.lock().await;
            let _ = writer.send(Message::Close(None)).await;
        });

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(RelayEvent::Connected).await;

        // Reader task: decode inbound frames into RelayEvents
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match ServerEvent::decode(text.as_str()) {
                        Ok(event) => {
                            if event_tx.send(RelayEvent::Event(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::warn!("Ignoring undecodable frame from relay: {e}");
                        }
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            // Connection lost
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(RelayEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Send an event to the relay.
    pub async fn emit(&self, event: &ClientEvent) -> Result<(), ProtocolError> {
        let frame = event.encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(frame)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Attach a user identity to this connection (`join-user`).
    pub async fn identify(&self, user_id: impl Into<String>) -> Result<(), ProtocolError> {
        self.emit(&ClientEvent::JoinUser {
            user_id: user_id.into(),
        })
        .await
    }

    /// Close the connection. The server sweeps our presence on close.
    pub async fn disconnect(&mut self) {
        // Dropping the writer channel makes the writer task send Close
        self.outgoing_tx = None;
        *self.state.write().await = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_initial_state() {
        let client = RelayClient::new("ws://127.0.0.1:5000");
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_emit_before_connect_fails() {
        let client = RelayClient::new("ws://127.0.0.1:5000");
        let result = client
            .emit(&ClientEvent::LeaveLive {
                stream_id: "s1".into(),
            })
            .await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_take_event_rx_once() {
        let mut client = RelayClient::new("ws://127.0.0.1:5000");
        assert!(client.take_event_rx().is_some());
        assert!(client.take_event_rx().is_none());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Unroutable local port: connect must fail cleanly
        let mut client = RelayClient::new("ws://127.0.0.1:1");
        let result = client.connect().await;
        assert!(result.is_err());
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }
}
