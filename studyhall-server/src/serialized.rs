//! All schemas that are exposed to clients are defined here, along with the
//! conversions into them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use studyhall_collab::{
    Participant as CollabParticipant, Room as CollabRoom, SessionKind, Timer as CollabTimer,
};

/// A room as it appears in listings.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: u64,
    pub room_code: String,
    pub name: String,
    pub description: String,
    pub participant_count: usize,
    pub max_participants: usize,
    pub is_timer_active: bool,
    pub host_name: String,
}

/// A room with its participants expanded.
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: u64,
    pub room_code: String,
    pub name: String,
    pub description: String,
    pub host_id: String,
    pub max_participants: usize,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub participants: Vec<Participant>,
    pub timer: Timer,
}

#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub user_id: String,
    pub is_host: bool,
    pub is_muted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timer {
    pub is_active: bool,
    pub kind: SessionKind,
    pub duration: u32,
    pub time_remaining: u32,
    pub session_count: u32,
    pub started_at: Option<DateTime<Utc>>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<RoomSummary> for CollabRoom {
    fn to_serialized(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            room_code: self.room_code.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            participant_count: self.participants.len(),
            max_participants: self.max_participants,
            is_timer_active: self.timer.is_active,
            // TODO: resolve the host's display name via the identity provider
            host_name: "Host".to_string(),
        }
    }
}

impl ToSerialized<Room> for CollabRoom {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            room_code: self.room_code.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            host_id: self.host_id.clone(),
            max_participants: self.max_participants,
            created_at: self.created_at,
            is_active: self.is_active,
            participants: self.participant_list().to_serialized(),
            timer: self.timer.to_serialized(),
        }
    }
}

impl ToSerialized<Participant> for CollabParticipant {
    fn to_serialized(&self) -> Participant {
        Participant {
            user_id: self.user_id.clone(),
            is_host: self.is_host,
            is_muted: self.is_muted,
        }
    }
}

impl ToSerialized<Timer> for CollabTimer {
    fn to_serialized(&self) -> Timer {
        Timer {
            is_active: self.is_active,
            kind: self.kind,
            duration: self.duration,
            time_remaining: self.time_remaining,
            session_count: self.session_count,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod test {
    use studyhall_collab::NewRoom;

    use super::*;

    #[test]
    fn summaries_project_counts_instead_of_identities() {
        let room = CollabRoom::new(
            "alice",
            NewRoom {
                name: "quiet hours".to_string(),
                description: None,
                max_participants: Some(4),
            },
        );

        let summary: RoomSummary = room.to_serialized();

        assert_eq!(summary.participant_count, 1);
        assert_eq!(summary.max_participants, 4);
        assert!(!summary.is_timer_active);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("participants").is_none());
        assert_eq!(json["room_code"], room.room_code.as_str());
    }

    #[test]
    fn details_expand_participants() {
        let room = CollabRoom::new(
            "alice",
            NewRoom {
                name: "quiet hours".to_string(),
                description: Some("shh".to_string()),
                max_participants: None,
            },
        );

        let detail: Room = room.to_serialized();

        assert_eq!(detail.participants.len(), 1);
        assert_eq!(detail.participants[0].user_id, "alice");
        assert!(detail.participants[0].is_host);
        assert_eq!(detail.timer.time_remaining, 25 * 60);
    }
}
