//! Connection registry: identity and membership bookkeeping per connection.
//!
//! The registry is the sole owner of per-connection state. Each record holds
//! the connection's transport outbox (an unbounded sender feeding the write
//! half of the socket), the user identity attached by `join-user`, and the
//! set of rooms the connection currently occupies. Nothing outside this
//! module mutates a record directly.
//!
//! All operations are total: identifying or forgetting an unknown connection
//! is a no-op, and `push` to a closed or missing outbox silently drops the
//! frame. Delivery here is fire-and-forget.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::rooms::RoomKey;

/// Process-unique handle for one live client connection.
pub type ConnectionId = Uuid;

/// Per-connection bookkeeping, owned by the registry.
struct ConnectionRecord {
    outbox: mpsc::UnboundedSender<Arc<str>>,
    user_id: Option<String>,
    joined: HashSet<RoomKey>,
}

/// Everything the registry knew about a connection, yielded once by `forget`.
#[derive(Debug)]
pub struct SweptConnection {
    pub user_id: Option<String>,
    pub joined: Vec<RoomKey>,
}

/// Registry of live connections.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionRecord>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a fresh connection id and register its transport outbox.
    pub async fn register(&self, outbox: mpsc::UnboundedSender<Arc<str>>) -> ConnectionId {
        let conn = Uuid::new_v4();
        let mut connections = self.connections.write().await;
        connections.insert(
            conn,
            ConnectionRecord {
                outbox,
                user_id: None,
                joined: HashSet::new(),
            },
        );
        conn
    }

    /// Attach a user identity to a connection.
    ///
    /// Idempotent; re-identifying overwrites. Returns the previous identity
    /// so the caller can migrate the personal-room membership. No-op (and
    /// `None`) for an unknown connection.
    pub async fn identify(&self, conn: ConnectionId, user_id: String) -> Option<String> {
        let mut connections = self.connections.write().await;
        let record = connections.get_mut(&conn)?;
        record.user_id.replace(user_id)
    }

    /// User identity currently attached to a connection, if any.
    pub async fn user_of(&self, conn: ConnectionId) -> Option<String> {
        let connections = self.connections.read().await;
        connections.get(&conn).and_then(|r| r.user_id.clone())
    }

    /// Record that a connection occupies a room. Returns `false` for an
    /// unknown connection, in which case the caller must not touch the
    /// room directory either.
    pub async fn track_join(&self, conn: ConnectionId, key: RoomKey) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&conn) {
            Some(record) => {
                record.joined.insert(key);
                true
            }
            None => false,
        }
    }

    /// Record that a connection left a room.
    pub async fn track_leave(&self, conn: ConnectionId, key: &RoomKey) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&conn) {
            Some(record) => record.joined.remove(key),
            None => false,
        }
    }

    /// Hand a rendered frame to a connection's transport queue.
    ///
    /// Non-blocking; a missing connection or closed outbox drops the frame.
    pub async fn push(&self, conn: ConnectionId, frame: &Arc<str>) {
        let connections = self.connections.read().await;
        if let Some(record) = connections.get(&conn) {
            let _ = record.outbox.send(frame.clone());
        }
    }

    /// Remove all bookkeeping for a connection, yielding what was known.
    ///
    /// Atomic take: the first caller gets `Some`, every later call gets
    /// `None`. Safe for connections that were never identified.
    pub async fn forget(&self, conn: ConnectionId) -> Option<SweptConnection> {
        let mut connections = self.connections.write().await;
        connections.remove(&conn).map(|record| SweptConnection {
            user_id: record.user_id,
            joined: record.joined.into_iter().collect(),
        })
    }

    /// Whether a connection is currently registered.
    pub async fn contains(&self, conn: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&conn)
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox() -> (
        mpsc::UnboundedSender<Arc<str>>,
        mpsc::UnboundedReceiver<Arc<str>>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_register_allocates_unique_ids() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();

        let a = registry.register(tx1).await;
        let b = registry.register(tx2).await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_identify_overwrites_and_returns_previous() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbox();
        let conn = registry.register(tx).await;

        assert_eq!(registry.identify(conn, "u1".into()).await, None);
        assert_eq!(
            registry.identify(conn, "u2".into()).await,
            Some("u1".into())
        );
        assert_eq!(registry.user_of(conn).await, Some("u2".into()));
    }

    #[tokio::test]
    async fn test_identify_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.identify(Uuid::new_v4(), "u1".into()).await, None);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_push_delivers_to_outbox() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = outbox();
        let conn = registry.register(tx).await;

        let frame: Arc<str> = Arc::from("{\"event\":\"call-ended\"}");
        registry.push(conn, &frame).await;
        assert_eq!(rx.recv().await.unwrap().as_ref(), frame.as_ref());
    }

    #[tokio::test]
    async fn test_push_after_forget_is_dropped() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbox();
        let conn = registry.register(tx).await;
        registry.forget(conn).await;

        // Must not panic or error
        registry.push(conn, &Arc::from("frame")).await;
    }

    #[tokio::test]
    async fn test_forget_is_exactly_once() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbox();
        let conn = registry.register(tx).await;
        registry.identify(conn, "u1".into()).await;
        registry.track_join(conn, RoomKey::live("s1")).await;

        let swept = registry.forget(conn).await.unwrap();
        assert_eq!(swept.user_id, Some("u1".into()));
        assert_eq!(swept.joined, vec![RoomKey::live("s1")]);

        assert!(registry.forget(conn).await.is_none());
    }

    #[tokio::test]
    async fn test_forget_never_identified() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbox();
        let conn = registry.register(tx).await;

        let swept = registry.forget(conn).await.unwrap();
        assert_eq!(swept.user_id, None);
        assert!(swept.joined.is_empty());
    }

    #[tokio::test]
    async fn test_track_join_unknown_connection() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.track_join(Uuid::new_v4(), RoomKey::live("s1")).await);
    }

    #[tokio::test]
    async fn test_track_leave_removes_membership() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbox();
        let conn = registry.register(tx).await;
        let key = RoomKey::live("s1");

        registry.track_join(conn, key.clone()).await;
        assert!(registry.track_leave(conn, &key).await);
        assert!(!registry.track_leave(conn, &key).await);

        let swept = registry.forget(conn).await.unwrap();
        assert!(swept.joined.is_empty());
    }
}
