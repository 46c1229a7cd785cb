//! # pulse-relay — realtime event relay for chat, calls and live streams
//!
//! Room-based publish/subscribe relay with ephemeral presence tracking. It
//! backs the realtime surface of a dating-app backend: chat typing
//! indicators, call signaling (offer/answer/ICE exchange) and live-stream
//! viewer counts. Everything here is in-memory and best-effort: no
//! durability, no replay, no delivery guarantee.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────┐
//! │ RelayClient │ ◄─────────────────► │ RelayServer │
//! │ (per user)  │    JSON events      │ (central)   │
//! └─────────────┘                     └──────┬──────┘
//!                                            │
//!                                     ┌──────┴──────┐
//!                                     │    Relay    │
//!                                     └──────┬──────┘
//!                    ┌───────────────┬───────┴───────┬───────────────┐
//!                    ▼               ▼               ▼               ▼
//!            ┌─────────────┐ ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!            │ Connection  │ │    Room     │ │    Event    │ │ Disconnect  │
//!            │  Registry   │ │  Directory  │ │   Router    │ │  Sweeper    │
//!            └─────────────┘ └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! Direct messages and call signaling unicast to the recipient's personal
//! channel (`user:<id>`, joined implicitly by `join-user`); live-stream
//! chat, gifts and reactions broadcast to the stream's room (`live:<id>`);
//! every membership change rebroadcasts the room's viewer count.
//!
//! ## Modules
//!
//! - [`protocol`] — JSON wire protocol (closed `ClientEvent`/`ServerEvent` enums)
//! - [`registry`] — connection identity, outboxes and membership bookkeeping
//! - [`rooms`] — room directory with snapshot-returning join/leave
//! - [`presence`] — viewer-count derivation and broadcast
//! - [`router`] — per-event delivery rules and fan-out
//! - [`sweeper`] — exactly-once disconnect cleanup
//! - [`server`] — WebSocket accept loop
//! - [`client`] — WebSocket client

pub mod protocol;
pub mod registry;
pub mod rooms;
pub mod presence;
pub mod router;
pub mod sweeper;
pub mod relay;
pub mod server;
pub mod client;

// Re-exports for convenience
pub use protocol::{ClientEvent, ProtocolError, ServerEvent, UserSummary};
pub use registry::{ConnectionId, ConnectionRegistry, SweptConnection};
pub use rooms::{RoomDirectory, RoomKey, RoomSnapshot};
pub use presence::PresenceCounter;
pub use router::EventRouter;
pub use sweeper::DisconnectSweeper;
pub use relay::Relay;
pub use server::{RelayServer, RelayStats, ServerConfig};
pub use client::{ConnectionState, RelayClient, RelayEvent};
