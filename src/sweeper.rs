//! Disconnect sweeper: exactly-once cleanup when a transport closes.
//!
//! Closing a connection takes its record out of the registry atomically, so
//! a duplicate close (read half erroring while the write half drops, say)
//! finds nothing and does nothing. The sweep then leaves every room the
//! connection occupied and hands each post-leave snapshot to the presence
//! counter — one `viewer-count` rebroadcast per formerly-joined live room.

use std::sync::Arc;

use crate::presence::PresenceCounter;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::rooms::RoomDirectory;

pub struct DisconnectSweeper {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomDirectory>,
    presence: Arc<PresenceCounter>,
}

impl DisconnectSweeper {
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

    /// Remove a closed connection from every room it occupied.
    ///
    /// Runs at most once per connection; later calls are no-ops.
    pub async fn sweep(&self, conn: ConnectionId) {
        let Some(swept) = self.registry.forget(conn).await else {
            log::debug!("Connection {conn} already swept");
            return;
        };

        for key in &swept.joined {
            let snapshot = self.rooms.leave(key, conn).await;
            self.presence.broadcast(key, &snapshot).await;
        }

        match swept.user_id {
            Some(user_id) => log::info!(
                "Connection {conn} (user {user_id}) disconnected, left {} rooms",
                swept.joined.len()
            ),
            None => log::info!("Connection {conn} disconnected (never identified)"),
        }
    }
}
