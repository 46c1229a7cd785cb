//! Room directory: keyed member sets for unicast channels and live rooms.
//!
//! A room is either a personal channel (`user:<userId>`, one per identified
//! user, addressed by unicast deliveries) or a live-stream room
//! (`live:<streamId>`, shared by all viewers). Rooms are created implicitly
//! on first join and reclaimed eagerly the moment their member set drains —
//! a personal channel stays addressable because the next join re-creates it.
//!
//! `join` and `leave` return a [`RoomSnapshot`] captured under the same
//! write guard as the mutation itself. Presence broadcasts built from that
//! snapshot therefore always reflect the count after that exact mutation,
//! and no caller ever iterates live set state: fan-out walks the snapshot
//! after the lock is released.

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::registry::ConnectionId;

/// A room key: one personal channel per user, one shared room per stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// Private delivery channel for a single user (`user:<id>`).
    User(String),
    /// Shared live-stream room (`live:<id>`).
    Live(String),
}

impl RoomKey {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn live(id: impl Into<String>) -> Self {
        Self::Live(id.into())
    }

    /// Personal channels never produce presence broadcasts.
    pub fn is_personal(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Live(id) => write!(f, "live:{id}"),
        }
    }
}

/// Point-in-time view of a room's membership, taken under the directory lock.
#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    pub members: Vec<ConnectionId>,
    pub count: usize,
}

impl RoomSnapshot {
    fn of(members: &HashSet<ConnectionId>) -> Self {
        Self {
            members: members.iter().copied().collect(),
            count: members.len(),
        }
    }
}

/// Maps room keys to member connection sets.
///
/// The member sets are the relay's only shared mutable state; all mutation
/// goes through `join`/`leave` and all reads return consistent snapshots.
pub struct RoomDirectory {
    rooms: RwLock<HashMap<RoomKey, HashSet<ConnectionId>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a room, creating the room if absent.
    ///
    /// Idempotent. Returns the post-join membership snapshot.
    pub async fn join(&self, key: &RoomKey, conn: ConnectionId) -> RoomSnapshot {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(key.clone()).or_default();
        members.insert(conn);
        RoomSnapshot::of(members)
    }

    /// Remove a connection from a room. No-op if it was not a member.
    ///
    /// Returns the post-leave snapshot (the leaver is not in it). A room
    /// whose member set drains is dropped immediately.
    pub async fn leave(&self, key: &RoomKey, conn: ConnectionId) -> RoomSnapshot {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(key) {
            Some(members) => {
                members.remove(&conn);
                let snapshot = RoomSnapshot::of(members);
                if members.is_empty() {
                    rooms.remove(key);
                }
                snapshot
            }
            None => RoomSnapshot::default(),
        }
    }

    /// Consistent snapshot of a room's current members.
    pub async fn members_of(&self, key: &RoomKey) -> Vec<ConnectionId> {
        let rooms = self.rooms.read().await;
        rooms
            .get(key)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Current member count; always agrees with `members_of().len()`.
    pub async fn member_count(&self, key: &RoomKey) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(key).map_or(0, HashSet::len)
    }

    /// Number of rooms currently held (empty rooms are never held).
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_room_key_display() {
        assert_eq!(RoomKey::user("u1").to_string(), "user:u1");
        assert_eq!(RoomKey::live("s42").to_string(), "live:s42");
        assert!(RoomKey::user("u1").is_personal());
        assert!(!RoomKey::live("s42").is_personal());
    }

    #[tokio::test]
    async fn test_join_creates_room() {
        let rooms = RoomDirectory::new();
        let key = RoomKey::live("s1");
        let conn = Uuid::new_v4();

        let snapshot = rooms.join(&key, conn).await;
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.members, vec![conn]);
        assert_eq!(rooms.member_count(&key).await, 1);
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let rooms = RoomDirectory::new();
        let key = RoomKey::live("s1");
        let conn = Uuid::new_v4();

        rooms.join(&key, conn).await;
        let snapshot = rooms.join(&key, conn).await;
        assert_eq!(snapshot.count, 1);
        assert_eq!(rooms.member_count(&key).await, 1);
    }

    #[tokio::test]
    async fn test_leave_restores_pre_join_count() {
        let rooms = RoomDirectory::new();
        let key = RoomKey::live("s1");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        rooms.join(&key, a).await;
        let before = rooms.member_count(&key).await;

        rooms.join(&key, b).await;
        let snapshot = rooms.leave(&key, b).await;
        assert_eq!(snapshot.count, before);
        assert_eq!(rooms.member_count(&key).await, before);
        assert!(!snapshot.members.contains(&b));
    }

    #[tokio::test]
    async fn test_leave_unknown_room_is_noop() {
        let rooms = RoomDirectory::new();
        let snapshot = rooms.leave(&RoomKey::live("ghost"), Uuid::new_v4()).await;
        assert_eq!(snapshot.count, 0);
        assert!(snapshot.members.is_empty());
    }

    #[tokio::test]
    async fn test_empty_room_reclaimed_eagerly() {
        let rooms = RoomDirectory::new();
        let key = RoomKey::live("s1");
        let conn = Uuid::new_v4();

        rooms.join(&key, conn).await;
        assert_eq!(rooms.room_count().await, 1);

        rooms.leave(&key, conn).await;
        assert_eq!(rooms.room_count().await, 0);
        assert_eq!(rooms.member_count(&key).await, 0);
    }

    #[tokio::test]
    async fn test_personal_room_rejoinable_after_drain() {
        let rooms = RoomDirectory::new();
        let key = RoomKey::user("u1");
        let conn = Uuid::new_v4();

        rooms.join(&key, conn).await;
        rooms.leave(&key, conn).await;
        assert_eq!(rooms.room_count().await, 0);

        // The channel is addressable again on the next join.
        let snapshot = rooms.join(&key, conn).await;
        assert_eq!(snapshot.count, 1);
    }

    #[tokio::test]
    async fn test_count_agrees_with_members() {
        let rooms = RoomDirectory::new();
        let key = RoomKey::live("s1");
        for _ in 0..5 {
            rooms.join(&key, Uuid::new_v4()).await;
        }
        assert_eq!(
            rooms.member_count(&key).await,
            rooms.members_of(&key).await.len()
        );
    }
}
