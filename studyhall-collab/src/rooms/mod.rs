mod room;

pub use room::*;

use log::warn;
use thiserror::Error;

use crate::{CollabContext, CollabEvent, NewRoomRecord};

/// Owns all room lifecycle operations. Every mutation runs to completion
/// under the registry lock, so same-room operations never interleave.
pub struct RoomManager {
    context: CollabContext,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Participant not found")]
    UserNotInRoom,
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room with the creator as its sole host participant, and
    /// mirrors it to the backing store without blocking on the write.
    pub fn create_room(&self, host_id: &str, new_room: NewRoom) -> Room {
        let room = Room::new(host_id, new_room);

        self.context
            .rooms
            .lock()
            .insert(room.id, room.clone());

        self.mirror_to_store(&room);
        self.context.emit(CollabEvent::RoomCreated { room: room.clone() });

        room
    }

    /// The registry is authoritative, so a failed store write is only logged
    /// and never rolled back or surfaced to the caller.
    fn mirror_to_store(&self, room: &Room) {
        let store = self.context.store.clone();
        let record = NewRoomRecord::from_room(room);

        tokio::spawn(async move {
            if let Err(err) = store.save_room(record).await {
                warn!("Failed to mirror room to the backing store: {err}");
            }
        });
    }

    /// Adds a user to a room. Joining a room you are already in returns the
    /// current state unchanged.
    pub fn join_room(&self, room_id: RoomId, user_id: &str) -> Result<Room, RoomError> {
        let snapshot = {
            let mut rooms = self.context.rooms.lock();
            let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;

            if room.participants.contains_key(user_id) {
                return Ok(room.clone());
            }

            if room.participants.len() >= room.max_participants {
                return Err(RoomError::RoomFull);
            }

            room.participants
                .insert(user_id.to_string(), Participant::new(user_id, false));

            room.clone()
        };

        self.context.emit(CollabEvent::UserJoined {
            room_id,
            user_id: user_id.to_string(),
            participants: snapshot.participant_list(),
        });

        Ok(snapshot)
    }

    /// Removes a user from a room, evicting the room (and tearing down its
    /// countdown) when it empties or the host leaves. Returns the resulting
    /// snapshot for broadcast purposes, or None if the room was absent.
    pub fn leave_room(&self, room_id: RoomId, user_id: &str) -> Option<Room> {
        let snapshot = {
            let mut rooms = self.context.rooms.lock();
            let room = rooms.get_mut(&room_id)?;

            room.participants.remove(user_id);

            let evict = room.participants.is_empty() || room.host_id == user_id;

            if evict {
                room.is_active = false;
            }

            let snapshot = room.clone();

            if evict {
                rooms.remove(&room_id);
                self.context.cancel_ticks(room_id);
            }

            snapshot
        };

        self.context.emit(CollabEvent::UserLeft {
            room_id,
            user_id: user_id.to_string(),
            participants: snapshot.participant_list(),
        });

        Some(snapshot)
    }

    /// Sets a participant's mute flag, or toggles it when no explicit value
    /// is given.
    pub fn update_mute(
        &self,
        room_id: RoomId,
        user_id: &str,
        desired: Option<bool>,
    ) -> Result<Participant, RoomError> {
        let participant = {
            let mut rooms = self.context.rooms.lock();
            let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;

            let participant = room
                .participants
                .get_mut(user_id)
                .ok_or(RoomError::UserNotInRoom)?;

            participant.is_muted = desired.unwrap_or(!participant.is_muted);
            participant.clone()
        };

        self.context.emit(CollabEvent::UserMuteChanged {
            room_id,
            user_id: user_id.to_string(),
            is_muted: participant.is_muted,
        });

        Ok(participant)
    }

    pub fn room_by_id(&self, room_id: RoomId) -> Option<Room> {
        self.context.rooms.lock().get(&room_id).cloned()
    }

    /// Rooms that should appear in listings. Eviction removes rooms from the
    /// registry outright, so everything present is active.
    pub fn list_active(&self) -> Vec<Room> {
        self.context
            .rooms
            .lock()
            .values()
            .filter(|room| room.is_active)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{auth::MockIdentity, store::FailingStore, Collab, EventReceiver, NoStore};

    fn test_collab() -> (Collab, EventReceiver) {
        Collab::new(Arc::new(MockIdentity), Arc::new(NoStore))
    }

    fn new_room(max_participants: Option<usize>) -> NewRoom {
        NewRoom {
            name: "deep focus".to_string(),
            description: Some("grinding".to_string()),
            max_participants,
        }
    }

    #[tokio::test]
    async fn create_makes_the_creator_the_host() {
        let (collab, _events) = test_collab();

        let room = collab.rooms.create_room("alice", new_room(None));

        assert_eq!(room.host_id, "alice");
        assert_eq!(room.max_participants, DEFAULT_MAX_PARTICIPANTS);
        assert!(room.is_active);
        assert!(room.participants["alice"].is_host);
        assert!(!room.timer.is_active);
        assert_eq!(collab.active_room_count(), 1);
    }

    #[tokio::test]
    async fn joining_is_idempotent() {
        let (collab, _events) = test_collab();
        let room = collab.rooms.create_room("alice", new_room(None));

        collab.rooms.join_room(room.id, "bob").unwrap();
        let rejoined = collab.rooms.join_room(room.id, "bob").unwrap();

        assert_eq!(rejoined.participants.len(), 2);
        assert!(!rejoined.participants["bob"].is_host);
    }

    #[tokio::test]
    async fn joining_a_full_room_fails_and_changes_nothing() {
        let (collab, _events) = test_collab();
        let room = collab.rooms.create_room("alice", new_room(Some(2)));

        collab.rooms.join_room(room.id, "bob").unwrap();

        assert_eq!(
            collab.rooms.join_room(room.id, "carol"),
            Err(RoomError::RoomFull)
        );

        let unchanged = collab.rooms.room_by_id(room.id).unwrap();
        assert_eq!(unchanged.participants.len(), 2);
        assert!(!unchanged.participants.contains_key("carol"));

        // A member of the full room can still "join" again.
        assert!(collab.rooms.join_room(room.id, "bob").is_ok());
    }

    #[tokio::test]
    async fn joining_a_missing_room_fails() {
        let (collab, _events) = test_collab();

        assert_eq!(
            collab.rooms.join_room(999, "bob"),
            Err(RoomError::RoomNotFound)
        );
    }

    #[tokio::test]
    async fn host_leaving_evicts_the_room() {
        let (collab, _events) = test_collab();
        let room = collab.rooms.create_room("alice", new_room(None));

        collab.rooms.join_room(room.id, "bob").unwrap();
        let evicted = collab.rooms.leave_room(room.id, "alice").unwrap();

        assert!(!evicted.is_active);
        assert!(collab.rooms.room_by_id(room.id).is_none());
        assert!(collab.rooms.list_active().is_empty());
    }

    #[tokio::test]
    async fn last_participant_leaving_evicts_the_room() {
        let (collab, _events) = test_collab();
        let room = collab.rooms.create_room("alice", new_room(None));

        collab.rooms.join_room(room.id, "bob").unwrap();

        // A non-host leaving keeps the room alive.
        collab.rooms.leave_room(room.id, "bob").unwrap();
        assert!(collab.rooms.room_by_id(room.id).is_some());

        collab.rooms.leave_room(room.id, "alice").unwrap();
        assert!(collab.rooms.room_by_id(room.id).is_none());
    }

    #[tokio::test]
    async fn leaving_a_missing_room_is_a_no_op() {
        let (collab, _events) = test_collab();

        assert!(collab.rooms.leave_room(999, "alice").is_none());
    }

    #[tokio::test]
    async fn double_toggle_restores_the_mute_flag() {
        let (collab, _events) = test_collab();
        let room = collab.rooms.create_room("alice", new_room(None));

        let muted = collab.rooms.update_mute(room.id, "alice", None).unwrap();
        assert!(muted.is_muted);

        let unmuted = collab.rooms.update_mute(room.id, "alice", None).unwrap();
        assert!(!unmuted.is_muted);
    }

    #[tokio::test]
    async fn explicit_mute_values_are_applied_exactly() {
        let (collab, _events) = test_collab();
        let room = collab.rooms.create_room("alice", new_room(None));

        let muted = collab
            .rooms
            .update_mute(room.id, "alice", Some(true))
            .unwrap();
        assert!(muted.is_muted);

        let still_muted = collab
            .rooms
            .update_mute(room.id, "alice", Some(true))
            .unwrap();
        assert!(still_muted.is_muted);

        assert_eq!(
            collab.rooms.update_mute(room.id, "ghost", None),
            Err(RoomError::UserNotInRoom)
        );
    }

    #[tokio::test]
    async fn membership_changes_are_emitted() {
        let (collab, mut events) = test_collab();
        let room = collab.rooms.create_room("alice", new_room(None));

        collab.rooms.join_room(room.id, "bob").unwrap();
        collab.rooms.update_mute(room.id, "bob", None).unwrap();
        collab.rooms.leave_room(room.id, "bob").unwrap();

        assert!(matches!(
            events.try_recv(),
            Ok(CollabEvent::RoomCreated { .. })
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(CollabEvent::UserJoined { ref user_id, ref participants, .. })
                if user_id == "bob" && participants.len() == 2
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(CollabEvent::UserMuteChanged { is_muted: true, .. })
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(CollabEvent::UserLeft { ref participants, .. }) if participants.len() == 1
        ));
    }

    #[tokio::test]
    async fn store_failures_never_fail_creation() {
        let (collab, _events) = Collab::new(Arc::new(MockIdentity), Arc::new(FailingStore));

        let room = collab.rooms.create_room("alice", new_room(None));

        // Give the detached mirror task a chance to run and fail.
        tokio::task::yield_now().await;

        assert!(collab.rooms.room_by_id(room.id).is_some());
    }
}
