use axum::{
    extract::{Path, State},
    routing::get,
    Json,
};
use serde::Serialize;
use studyhall_collab::RoomId;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    serialized::{Room, RoomSummary, ToSerialized},
    Router,
};

/// Lists the rooms that are currently open.
async fn list_rooms(
    _session: Session,
    State(context): State<ServerContext>,
) -> Json<Vec<RoomSummary>> {
    let rooms: Vec<RoomSummary> = context
        .collab
        .rooms
        .list_active()
        .iter()
        .map(|room| room.to_serialized())
        .collect();

    Json(rooms)
}

/// Fetches one room, participants expanded.
async fn room(
    _session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<RoomId>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .room_by_id(room_id)
        .ok_or(ServerError::NotFound { resource: "Room" })?;

    Ok(Json(room.to_serialized()))
}

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    active_rooms: usize,
    active_timers: usize,
}

/// Liveness probe carrying the counts that matter for this process.
pub async fn health(State(context): State<ServerContext>) -> Json<Health> {
    Json(Health {
        status: "ok",
        active_rooms: context.collab.active_room_count(),
        active_timers: context.collab.active_timer_count(),
    })
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/:id", get(room))
}
