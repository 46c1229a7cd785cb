//! JSON wire protocol for the realtime relay.
//!
//! Every frame is a text message carrying a socket.io-style envelope:
//! ```text
//! {"event": "<name>", "data": { ...camelCase payload... }}
//! ```
//!
//! The event set is closed: [`ClientEvent`] enumerates everything a client
//! may send, [`ServerEvent`] everything the relay pushes back. Decoding
//! validates the payload shape up front — an unknown event name or a missing
//! required field fails with [`ProtocolError::Malformed`] and the frame is
//! dropped at the transport boundary; nothing half-parsed reaches the router.
//!
//! Opaque payloads (chat message bodies, WebRTC SDP answers, ICE candidates,
//! gift descriptors) are carried as raw `serde_json::Value` — the relay
//! forwards them, it does not interpret them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events a connected client sends to the relay.
///
/// Tag is the wire event name, content is the `data` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Attach a user identity to this connection (implicit personal-room join).
    JoinUser { user_id: String },
    /// Relay a chat message to the receiver's personal channel.
    SendMessage {
        chat_id: String,
        message: Value,
        sender_id: String,
        receiver_id: String,
    },
    /// Typing indicator for a one-to-one chat.
    Typing {
        chat_id: String,
        sender_id: String,
        receiver_id: String,
    },
    /// Typing indicator cleared.
    StopTyping {
        chat_id: String,
        sender_id: String,
        receiver_id: String,
    },
    /// Call invitation (rings the receiver).
    CallUser {
        caller_id: String,
        caller_name: String,
        call_id: String,
        receiver_id: String,
    },
    /// SDP answer back to the caller.
    AnswerCall {
        answer: Value,
        call_id: String,
        caller_id: String,
    },
    /// Hang up an in-progress or ringing call.
    EndCall {
        call_id: String,
        receiver_id: String,
    },
    /// ICE candidate exchange during call setup.
    IceCandidate {
        candidate: Value,
        call_id: String,
        receiver_id: String,
    },
    /// Enter a live stream's room as a viewer.
    JoinLive { stream_id: String, user_id: String },
    /// Leave a live stream's room.
    LeaveLive { stream_id: String },
    /// Chat message inside a live stream, fanned out to all viewers.
    LiveMessage { stream_id: String, message: Value },
    /// Virtual gift sent during a live stream.
    SendGift {
        stream_id: String,
        gift: Value,
        user_id: String,
        user_name: String,
        coins: u64,
    },
    /// Emoji reaction during a live stream.
    LiveReaction {
        stream_id: String,
        emoji: String,
        user_id: String,
        user_name: String,
    },
}

/// Minimal user identity attached to broadcast events that need attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub full_name: String,
}

/// Events the relay pushes to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    NewMessage {
        chat_id: String,
        message: Value,
        sender_id: String,
    },
    UserTyping {
        chat_id: String,
        user_id: String,
    },
    UserStoppedTyping {
        chat_id: String,
        user_id: String,
    },
    IncomingCall {
        caller_id: String,
        caller_name: String,
        call_id: String,
    },
    CallAnswered {
        answer: Value,
        call_id: String,
    },
    CallEnded {
        call_id: String,
    },
    IceCandidate {
        candidate: Value,
        call_id: String,
    },
    /// Live viewer count, rebroadcast after every membership change.
    ViewerCount {
        count: usize,
        stream_id: String,
    },
    LiveMessage {
        message: Value,
    },
    GiftReceived {
        user: UserSummary,
        gift: Value,
        coins: u64,
    },
    Reaction {
        user: UserSummary,
        emoji: String,
    },
}

impl ClientEvent {
    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Parse and validate a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

impl ServerEvent {
    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Parse and validate a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    /// Frame failed schema validation (unknown event, missing field, bad JSON).
    Malformed(String),
    /// Outbound event could not be serialized.
    Serialization(String),
    /// Transport is gone.
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "Malformed event: {e}"),
            Self::Serialization(e) => write!(f, "Serialization error: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
