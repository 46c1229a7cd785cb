//! Event router: per-event delivery rules and fan-out.
//!
//! The router turns one decoded [`ClientEvent`] into zero or more pushes:
//!
//! - chat, typing and call-signaling events unicast to the recipient's
//!   personal channel (the sending connection is never a target);
//! - live-stream chat, gifts and reactions broadcast to the stream's room,
//!   sender included;
//! - `join-live`/`leave-live` mutate room membership and hand the resulting
//!   snapshot to the presence counter.
//!
//! Every outbound event is rendered once and the shared frame is pushed to
//! each target's outbox. Fan-out iterates membership snapshots only — no
//! transport handoff happens while a directory lock is held. A target room
//! with no members means the event is dropped on the floor; this relay is
//! best-effort and never surfaces delivery failure to the sender.

use std::sync::Arc;

use crate::presence::PresenceCounter;
use crate::protocol::{ClientEvent, ServerEvent, UserSummary};
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::rooms::{RoomDirectory, RoomKey};

pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomDirectory>,
    presence: Arc<PresenceCounter>,
}

impl EventRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomDirectory>,
        presence: Arc<PresenceCounter>,
    ) -> Self {
        Self {
            registry,
            rooms,
            presence,
        }
    }

    /// Apply one inbound event from `sender`.
    ///
    /// Infallible from the caller's perspective: bad targets are dropped,
    /// never errored. Events from one connection are dispatched inline on
    /// its read task, which preserves per-sender ordering.
    pub async fn dispatch(&self, sender: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinUser { user_id } => {
                self.identify(sender, user_id).await;
            }

            ClientEvent::SendMessage {
                chat_id,
                message,
                sender_id,
                receiver_id,
            } => {
                let event = ServerEvent::NewMessage {
                    chat_id,
                    message,
                    sender_id,
                };
                self.unicast(sender, &receiver_id, &event).await;
            }

            ClientEvent::Typing {
                chat_id,
                sender_id,
                receiver_id,
            } => {
                let event = ServerEvent::UserTyping {
                    chat_id,
                    user_id: sender_id,
                };
                self.unicast(sender, &receiver_id, &event).await;
            }

            ClientEvent::StopTyping {
                chat_id,
                sender_id,
                receiver_id,
            } => {
                let event = ServerEvent::UserStoppedTyping {
                    chat_id,
                    user_id: sender_id,
                };
                self.unicast(sender, &receiver_id, &event).await;
            }

            ClientEvent::CallUser {
                caller_id,
                caller_name,
                call_id,
                receiver_id,
            } => {
                let event = ServerEvent::IncomingCall {
                    caller_id,
                    caller_name,
                    call_id,
                };
                self.unicast(sender, &receiver_id, &event).await;
            }

            ClientEvent::AnswerCall {
                answer,
                call_id,
                caller_id,
            } => {
                let event = ServerEvent::CallAnswered { answer, call_id };
                self.unicast(sender, &caller_id, &event).await;
            }

            ClientEvent::EndCall {
                call_id,
                receiver_id,
            } => {
                let event = ServerEvent::CallEnded { call_id };
                self.unicast(sender, &receiver_id, &event).await;
            }

            ClientEvent::IceCandidate {
                candidate,
                call_id,
                receiver_id,
            } => {
                let event = ServerEvent::IceCandidate { candidate, call_id };
                self.unicast(sender, &receiver_id, &event).await;
            }

            ClientEvent::JoinLive { stream_id, .. } => {
                self.join_room(sender, RoomKey::live(stream_id)).await;
            }

            ClientEvent::LeaveLive { stream_id } => {
                self.leave_room(sender, RoomKey::live(stream_id)).await;
            }

            ClientEvent::LiveMessage { stream_id, message } => {
                let event = ServerEvent::LiveMessage { message };
                self.broadcast(&RoomKey::live(stream_id), &event).await;
            }

            ClientEvent::SendGift {
                stream_id,
                gift,
                user_id,
                user_name,
                coins,
            } => {
                let event = ServerEvent::GiftReceived {
                    user: UserSummary {
                        id: user_id,
                        full_name: user_name,
                    },
                    gift,
                    coins,
                };
                self.broadcast(&RoomKey::live(stream_id), &event).await;
            }

            ClientEvent::LiveReaction {
                stream_id,
                emoji,
                user_id,
                user_name,
            } => {
                let event = ServerEvent::Reaction {
                    user: UserSummary {
                        id: user_id,
                        full_name: user_name,
                    },
                    emoji,
                };
                self.broadcast(&RoomKey::live(stream_id), &event).await;
            }
        }
    }

    /// Attach a user identity and move the connection into its personal
    /// channel. Re-identifying migrates the membership to the new channel.
    async fn identify(&self, conn: ConnectionId, user_id: String) {
        let previous = self.registry.identify(conn, user_id.clone()).await;
        if let Some(old) = previous.filter(|old| *old != user_id) {
            let old_key = RoomKey::user(old);
            self.registry.track_leave(conn, &old_key).await;
            self.rooms.leave(&old_key, conn).await;
        }

        let key = RoomKey::user(&user_id);
        // track_join fails only for an unregistered (already swept)
        // connection; never touch the directory for one of those.
        if self.registry.track_join(conn, key.clone()).await {
            self.rooms.join(&key, conn).await;
            log::info!("Connection {conn} identified as user {user_id}");
        }
    }

    async fn join_room(&self, conn: ConnectionId, key: RoomKey) {
        if !self.registry.track_join(conn, key.clone()).await {
            log::debug!("Join to {key} from unknown connection {conn}, ignored");
            return;
        }
        let snapshot = self.rooms.join(&key, conn).await;
        log::debug!("Connection {conn} joined {key}");
        self.presence.broadcast(&key, &snapshot).await;
    }

    async fn leave_room(&self, conn: ConnectionId, key: RoomKey) {
        self.registry.track_leave(conn, &key).await;
        let snapshot = self.rooms.leave(&key, conn).await;
        log::debug!("Connection {conn} left {key}");
        self.presence.broadcast(&key, &snapshot).await;
    }

    /// Deliver to every connection in a user's personal channel except the
    /// sending connection.
    async fn unicast(&self, sender: ConnectionId, receiver_id: &str, event: &ServerEvent) {
        let key = RoomKey::user(receiver_id);
        let members = self.rooms.members_of(&key).await;
        if members.is_empty() {
            log::debug!("No connections for {key}, event dropped");
            return;
        }

        let Some(frame) = render(event) else { return };
        for conn in members {
            if conn != sender {
                self.registry.push(conn, &frame).await;
            }
        }
    }

    /// Deliver to every current member of a room, sender included.
    async fn broadcast(&self, key: &RoomKey, event: &ServerEvent) {
        let members = self.rooms.members_of(key).await;
        if members.is_empty() {
            log::debug!("Room {key} is empty, event dropped");
            return;
        }

        let Some(frame) = render(event) else { return };
        for conn in members {
            self.registry.push(conn, &frame).await;
        }
    }
}

/// Render an outbound event once so fan-out shares a single frame.
fn render(event: &ServerEvent) -> Option<Arc<str>> {
    match event.encode() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            log::error!("Failed to encode outbound event: {e}");
            None
        }
    }
}
