//! The message format spoken over the gateway connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use studyhall_collab::{RoomId, SessionKind};
use validator::Validate;

use crate::serialized::{Participant, Room, RoomSummary, Timer};

/// Messages sent by clients over the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateRoom(CreateRoomPayload),
    JoinRoom { room_id: RoomId },
    LeaveRoom,
    ToggleMute { is_muted: Option<bool> },
    StartTimer { kind: SessionKind },
    PauseTimer,
    StopTimer,
    WebrtcOffer(SignalPayload),
    WebrtcAnswer(SignalPayload),
    WebrtcIceCandidate(SignalPayload),
}

/// Fields accepted when creating a room.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoomPayload {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 50))]
    pub max_participants: Option<usize>,
}

/// An opaque negotiation message addressed to another user. The server never
/// inspects the payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalPayload {
    pub target_user_id: String,
    pub payload: Value,
}

/// Messages sent to clients over the gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Success or failure acknowledgment for a client operation.
    Ack(Ack),
    RoomCreated {
        room: RoomSummary,
    },
    UserJoined {
        user_id: String,
        participants: Vec<Participant>,
    },
    UserLeft {
        user_id: String,
        participants: Vec<Participant>,
    },
    UserMuteChanged {
        user_id: String,
        is_muted: bool,
    },
    TimerStarted {
        timer: Timer,
    },
    TimerUpdate {
        time_remaining: u32,
        kind: SessionKind,
        session_count: u32,
    },
    TimerPaused {
        timer: Timer,
    },
    TimerStop {
        timer: Timer,
    },
    TimerCompleted {
        kind: SessionKind,
        session_count: u32,
    },
    WebrtcOffer {
        from_user_id: String,
        payload: Value,
    },
    WebrtcAnswer {
        from_user_id: String,
        payload: Value,
    },
    WebrtcIceCandidate {
        from_user_id: String,
        payload: Value,
    },
}

/// Every fallible client operation is answered with one of these, carrying
/// either a result payload or a human-readable error.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub op: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<Room>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<Timer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok(op: &'static str) -> Self {
        Self {
            op,
            success: true,
            room: None,
            timer: None,
            is_muted: None,
            error: None,
        }
    }

    pub fn error(op: &'static str, error: impl ToString) -> Self {
        Self {
            op,
            success: false,
            room: None,
            timer: None,
            is_muted: None,
            error: Some(error.to_string()),
        }
    }

    pub fn with_room(mut self, room: Room) -> Self {
        self.room = Some(room);
        self
    }

    pub fn with_timer(mut self, timer: Timer) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn with_mute(mut self, is_muted: bool) -> Self {
        self.is_muted = Some(is_muted);
        self
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_messages_deserialize_from_their_tagged_form() {
        let message: ClientMessage = serde_json::from_value(json!({
            "type": "create-room",
            "name": "night owls",
            "max_participants": 4
        }))
        .unwrap();

        assert!(matches!(
            message,
            ClientMessage::CreateRoom(CreateRoomPayload {
                ref name,
                description: None,
                max_participants: Some(4),
            }) if name == "night owls"
        ));

        let message: ClientMessage =
            serde_json::from_value(json!({ "type": "toggle-mute" })).unwrap();
        assert!(matches!(
            message,
            ClientMessage::ToggleMute { is_muted: None }
        ));

        let message: ClientMessage = serde_json::from_value(json!({
            "type": "start-timer",
            "kind": "long_break"
        }))
        .unwrap();
        assert!(matches!(
            message,
            ClientMessage::StartTimer {
                kind: SessionKind::LongBreak
            }
        ));

        let message: ClientMessage = serde_json::from_value(json!({
            "type": "webrtc-offer",
            "target_user_id": "bob",
            "payload": { "sdp": "v=0" }
        }))
        .unwrap();
        assert!(matches!(
            message,
            ClientMessage::WebrtcOffer(SignalPayload { ref target_user_id, .. })
                if target_user_id == "bob"
        ));
    }

    #[test]
    fn unknown_message_types_are_rejected() {
        let result = serde_json::from_value::<ClientMessage>(json!({ "type": "self-destruct" }));

        assert!(result.is_err());
    }

    #[test]
    fn acks_keep_the_wire_shape_flat() {
        let ack = ServerMessage::Ack(Ack::ok("toggle-mute").with_mute(true));
        let json = serde_json::to_value(&ack).unwrap();

        assert_eq!(json["type"], "ack");
        assert_eq!(json["op"], "toggle-mute");
        assert_eq!(json["success"], true);
        assert_eq!(json["is_muted"], true);
        assert!(json.get("room").is_none());
        assert!(json.get("error").is_none());

        let failure = ServerMessage::Ack(Ack::error("join-room", "Room is full"));
        let json = serde_json::to_value(&failure).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Room is full");
    }

    #[test]
    fn broadcast_events_are_tagged_with_kebab_case_names() {
        let message = ServerMessage::TimerUpdate {
            time_remaining: 1499,
            kind: SessionKind::Work,
            session_count: 3,
        };
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "timer-update");
        assert_eq!(json["time_remaining"], 1499);
        assert_eq!(json["kind"], "work");

        let message = ServerMessage::WebrtcIceCandidate {
            from_user_id: "alice".to_string(),
            payload: json!({ "candidate": "host 127.0.0.1" }),
        };
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "webrtc-ice-candidate");
        assert_eq!(json["from_user_id"], "alice");
    }

    #[test]
    fn create_room_payloads_are_validated() {
        let empty_name = CreateRoomPayload {
            name: String::new(),
            description: None,
            max_participants: None,
        };
        assert!(empty_name.validate().is_err());

        let zero_cap = CreateRoomPayload {
            name: "study".to_string(),
            description: None,
            max_participants: Some(0),
        };
        assert!(zero_cap.validate().is_err());

        let fine = CreateRoomPayload {
            name: "study".to_string(),
            description: Some("chill".to_string()),
            max_participants: Some(10),
        };
        assert!(fine.validate().is_ok());
    }
}
