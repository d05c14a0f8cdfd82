mod auth;
mod events;
mod rooms;
mod store;
mod timer;
mod util;

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub use auth::{Auth, AuthError, AuthUser, HttpIdentityProvider, IdentityProvider};
pub use events::*;
pub use rooms::*;
pub use store::{NewRoomRecord, NoStore, RestRoomStore, RoomStore, StoreError};
pub use timer::{SessionKind, Timer, TimerEngine};

use timer::ScheduledTicks;

/// The studyhall collab system: the room registry, the countdown engine, and
/// the seams to the external identity provider and backing store.
pub struct Collab {
    context: CollabContext,

    pub rooms: RoomManager,
    pub timer: TimerEngine,
    pub auth: Auth,
}

/// A type passed to components of the collab system, to access shared state
/// and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub(crate) rooms: Arc<Mutex<HashMap<RoomId, Room>>>,
    pub(crate) timers: Arc<DashMap<RoomId, ScheduledTicks>>,
    pub(crate) store: Arc<dyn RoomStore>,
    events: EventSender,
}

impl Collab {
    /// Builds the collab system. The returned receiver is the other end of
    /// the event bus and should be drained by whatever fans events out to
    /// clients.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn RoomStore>,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();

        let context = CollabContext {
            rooms: Default::default(),
            timers: Default::default(),
            store,
            events,
        };

        let collab = Self {
            rooms: RoomManager::new(&context),
            timer: TimerEngine::new(&context),
            auth: Auth::new(identity),
            context,
        };

        (collab, receiver)
    }

    /// The number of rooms currently present in the registry.
    pub fn active_room_count(&self) -> usize {
        self.context.rooms.lock().len()
    }

    /// The number of rooms with a scheduled countdown.
    pub fn active_timer_count(&self) -> usize {
        self.context.timers.len()
    }
}

impl CollabContext {
    /// Emits a collab event. A send only fails when the receiving end is
    /// gone, which happens during shutdown and nowhere else.
    pub(crate) fn emit(&self, event: CollabEvent) {
        let _ = self.events.send(event);
    }
}
