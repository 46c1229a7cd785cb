//! Relay composition: one explicitly owned instance wiring the registry,
//! room directory, presence counter, router and sweeper together.
//!
//! There is no global state anywhere in this crate — the server (or an
//! embedding application, or a test) constructs a `Relay`, holds it in an
//! `Arc`, and passes references down. Dropping the relay drops all presence
//! state with it; nothing survives a restart.

use std::sync::Arc;

use crate::presence::PresenceCounter;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomDirectory;
use crate::router::EventRouter;
use crate::sweeper::DisconnectSweeper;

pub struct Relay {
    pub registry: Arc<ConnectionRegistry>,
    pub rooms: Arc<RoomDirectory>,
    pub presence: Arc<PresenceCounter>,
    pub router: EventRouter,
    pub sweeper: DisconnectSweeper,
}

impl Relay {
    pub fn new() -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomDirectory::new());
        let presence = Arc::new(PresenceCounter::new(registry.clone()));
        let router = EventRouter::new(registry.clone(), rooms.clone(), presence.clone());
        let sweeper = DisconnectSweeper::new(registry.clone(), rooms.clone(), presence.clone());

        Self {
            registry,
            rooms,
            presence,
            router,
            sweeper,
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
