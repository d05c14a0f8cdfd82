use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    util::{next_room_id, random_room_code},
    Timer,
};

pub type RoomId = u64;

/// The participant cap used when a room doesn't specify one.
pub const DEFAULT_MAX_PARTICIPANTS: usize = 10;

/// Fields supplied by the user creating a room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub description: Option<String>,
    pub max_participants: Option<usize>,
}

/// An ephemeral study room session, grouping participants around a shared
/// countdown and voice channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    /// A short code users can share to find the room.
    pub room_code: String,
    pub name: String,
    pub description: String,
    pub host_id: String,
    pub max_participants: usize,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    /// Participants keyed by user id. The host is a participant from creation
    /// until the room is evicted.
    pub participants: HashMap<String, Participant>,
    pub timer: Timer,
}

/// A user's membership record within a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: String,
    pub is_host: bool,
    pub is_muted: bool,
}

impl Room {
    pub fn new(host_id: &str, new_room: NewRoom) -> Self {
        let host = Participant::new(host_id, true);

        Self {
            id: next_room_id(),
            room_code: random_room_code(),
            name: new_room.name,
            description: new_room.description.unwrap_or_default(),
            host_id: host_id.to_string(),
            max_participants: new_room
                .max_participants
                .unwrap_or(DEFAULT_MAX_PARTICIPANTS),
            created_at: Utc::now(),
            is_active: true,
            participants: HashMap::from([(host_id.to_string(), host)]),
            timer: Timer::default(),
        }
    }

    /// The participants as a list, for broadcasts and detail responses.
    pub fn participant_list(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }
}

impl Participant {
    pub fn new(user_id: &str, is_host: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            is_host,
            is_muted: false,
        }
    }
}
