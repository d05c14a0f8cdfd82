use tokio::sync::mpsc;

use crate::{Participant, Room, RoomId, SessionKind, Timer};

pub type EventSender = mpsc::UnboundedSender<CollabEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<CollabEvent>;

/// Events emitted by the collab system whenever room or timer state changes.
/// The server fans these out to the affected connections.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// A new room was opened and should appear in listings.
    RoomCreated { room: Room },
    /// A user became a participant of a room.
    UserJoined {
        room_id: RoomId,
        user_id: String,
        participants: Vec<Participant>,
    },
    /// A user left a room, either explicitly or by disconnecting.
    UserLeft {
        room_id: RoomId,
        user_id: String,
        participants: Vec<Participant>,
    },
    /// A participant's mute flag changed.
    UserMuteChanged {
        room_id: RoomId,
        user_id: String,
        is_muted: bool,
    },
    /// A countdown was started, superseding whatever ran before it.
    TimerStarted { room_id: RoomId, timer: Timer },
    /// One second elapsed on a running countdown.
    TimerUpdate {
        room_id: RoomId,
        time_remaining: u32,
        kind: SessionKind,
        session_count: u32,
    },
    /// The host paused the countdown.
    TimerPaused { room_id: RoomId, timer: Timer },
    /// The host stopped the countdown, resetting it to idle defaults.
    TimerStopped { room_id: RoomId, timer: Timer },
    /// A countdown reached zero on its own.
    TimerCompleted {
        room_id: RoomId,
        kind: SessionKind,
        session_count: u32,
    },
}
