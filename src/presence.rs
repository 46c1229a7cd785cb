//! Presence counter: live viewer counts derived from room membership.
//!
//! Presence is never stored — it is the size of a room's member set at the
//! moment a membership mutation completes. The counter takes the snapshot
//! that `join`/`leave` captured under the directory's write guard and pushes
//! a `viewer-count` event to every connection still in the room, so the
//! broadcast always carries the count after that exact mutation.
//!
//! Personal channels have no audience to count; only live rooms broadcast.

use std::sync::Arc;

use crate::protocol::ServerEvent;
use crate::registry::ConnectionRegistry;
use crate::rooms::{RoomKey, RoomSnapshot};

pub struct PresenceCounter {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceCounter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Broadcast the post-mutation viewer count to a room's members.
    ///
    /// No-op for personal channels and for rooms with no members left.
    pub async fn broadcast(&self, key: &RoomKey, snapshot: &RoomSnapshot) {
        let RoomKey::Live(stream_id) = key else {
            return;
        };

        let event = ServerEvent::ViewerCount {
            count: snapshot.count,
            stream_id: stream_id.clone(),
        };
        let frame: Arc<str> = match event.encode() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                log::error!("Failed to encode viewer-count for {key}: {e}");
                return;
            }
        };

        log::debug!("Presence: {key} now {} viewers", snapshot.count);
        for conn in &snapshot.members {
            self.registry.push(*conn, &frame).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_broadcast_reaches_all_members() {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = PresenceCounter::new(registry.clone());

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = registry.register(tx_a).await;
        let b = registry.register(tx_b).await;

        let key = RoomKey::live("s1");
        let snapshot = RoomSnapshot {
            members: vec![a, b],
            count: 2,
        };
        presence.broadcast(&key, &snapshot).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let frame = rx.try_recv().unwrap();
            let event = ServerEvent::decode(&frame).unwrap();
            assert_eq!(
                event,
                ServerEvent::ViewerCount {
                    count: 2,
                    stream_id: "s1".into()
                }
            );
        }
    }

    #[tokio::test]
    async fn test_personal_channel_produces_no_broadcast() {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = PresenceCounter::new(registry.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = registry.register(tx).await;

        let key = RoomKey::user("u1");
        let snapshot = RoomSnapshot {
            members: vec![conn],
            count: 1,
        };
        presence.broadcast(&key, &snapshot).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_silent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = PresenceCounter::new(registry);
        presence
            .broadcast(&RoomKey::live("s1"), &RoomSnapshot::default())
            .await;
        // Nothing to assert beyond "did not panic": no members, no delivery.
    }
}
