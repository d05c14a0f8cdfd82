//! The connection gateway. Authenticates every persistent connection, wires
//! it to the room, timer, and signaling operations, and fans collab events
//! out to the affected connections.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use parking_lot::Mutex;
use serde::Deserialize;
use studyhall_collab::{AuthUser, CollabEvent, EventReceiver, NewRoom, RoomId, SessionKind};
use tokio::sync::mpsc;
use validator::Validate;

use crate::{
    context::ServerContext,
    errors::ServerError,
    protocol::{Ack, ClientMessage, CreateRoomPayload, ServerMessage},
    relay,
    serialized::ToSerialized,
};

static CONNECTION_ID_COUNTER: AtomicCell<u64> = AtomicCell::new(1);

/// One authenticated gateway connection.
pub struct Connection {
    id: u64,
    pub user_id: String,
    pub email: Option<String>,
    outgoing: mpsc::UnboundedSender<Message>,
    /// The room this connection is currently a participant of, if any.
    current_room: Mutex<Option<RoomId>>,
}

impl Connection {
    fn new(user: AuthUser, outgoing: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: CONNECTION_ID_COUNTER.fetch_add(1),
            user_id: user.id,
            email: user.email,
            outgoing,
            current_room: Default::default(),
        }
    }

    /// Queues a message for this connection. Failures mean the connection is
    /// shutting down, so they are ignored.
    fn send(&self, message: &ServerMessage) {
        if let Ok(text) = serde_json::to_string(message) {
            let _ = self.outgoing.send(Message::Text(text));
        }
    }

    fn current_room(&self) -> Option<RoomId> {
        *self.current_room.lock()
    }

    fn set_current_room(&self, room_id: Option<RoomId>) {
        *self.current_room.lock() = room_id;
    }
}

/// All live gateway connections, keyed by user id. A reconnect replaces the
/// previous connection for that user.
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: DashMap::new(),
        })
    }

    fn register(&self, connection: Arc<Connection>) {
        self.connections
            .insert(connection.user_id.clone(), connection);
    }

    /// Removes the connection only if it is still the registered one, so a
    /// reconnect that already replaced it is left alone.
    fn unregister(&self, connection: &Connection) {
        self.connections
            .remove_if(&connection.user_id, |_, c| c.id == connection.id);
    }

    /// Delivers to the addressed user. Returns false if they have no
    /// connection.
    pub fn send_to_user(&self, user_id: &str, message: &ServerMessage) -> bool {
        match self.connections.get(user_id) {
            Some(connection) => {
                connection.send(message);
                true
            }
            None => false,
        }
    }

    /// Fans a message out to every connection currently in the room, except
    /// the given user.
    pub fn broadcast_room(&self, room_id: RoomId, except: Option<&str>, message: &ServerMessage) {
        for connection in self.connections.iter() {
            if connection.current_room() == Some(room_id)
                && Some(connection.user_id.as_str()) != except
            {
                connection.send(message);
            }
        }
    }

    /// Fans a message out to every connection.
    pub fn broadcast_all(&self, except: Option<&str>, message: &ServerMessage) {
        for connection in self.connections.iter() {
            if Some(connection.user_id.as_str()) != except {
                connection.send(message);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    token: Option<String>,
}

/// Upgrades a client to the persistent event channel. The bearer credential
/// is verified before the upgrade completes, so a missing or rejected token
/// refuses the connection before any handler is attached.
pub async fn gateway_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    State(context): State<ServerContext>,
) -> Result<Response, ServerError> {
    let token = query
        .token
        .or_else(|| bearer_from_headers(&headers))
        .unwrap_or_default();

    let user = context.collab.auth.verify(&token).await?;

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, context, user)))
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.strip_prefix("Bearer "))
        .map(|x| x.to_string())
}

async fn handle_connection(socket: WebSocket, context: ServerContext, user: AuthUser) {
    let (mut ws_outgoing, mut ws_incoming) = socket.split();
    let (outgoing, mut outgoing_receiver) = mpsc::unbounded_channel::<Message>();

    let connection = Arc::new(Connection::new(user, outgoing));
    context.connections.register(connection.clone());

    match &connection.email {
        Some(email) => info!("User {} ({email}) connected", connection.user_id),
        None => info!("User {} connected", connection.user_id),
    }

    // Forward queued outbound messages to the socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing_receiver.recv().await {
            if ws_outgoing.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(incoming) = ws_incoming.next().await {
        let text = match incoming {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => handle_message(&context, &connection, message),
            Err(err) => debug!(
                "Discarding malformed message from {}: {err}",
                connection.user_id
            ),
        }
    }

    info!("User {} disconnected", connection.user_id);

    // Membership must never leak a stale participant.
    if let Some(room_id) = connection.current_room() {
        context.collab.rooms.leave_room(room_id, &connection.user_id);
        connection.set_current_room(None);
    }

    context.connections.unregister(&connection);
    writer.abort();
}

/// Dispatches one client operation. Every fallible operation ends in an
/// acknowledgment, so a failed handler can never take down the connection.
fn handle_message(context: &ServerContext, connection: &Connection, message: ClientMessage) {
    match message {
        ClientMessage::CreateRoom(payload) => create_room(context, connection, payload),
        ClientMessage::JoinRoom { room_id } => join_room(context, connection, room_id),
        ClientMessage::LeaveRoom => leave_room(context, connection),
        ClientMessage::ToggleMute { is_muted } => toggle_mute(context, connection, is_muted),
        ClientMessage::StartTimer { kind } => start_timer(context, connection, kind),
        ClientMessage::PauseTimer => pause_timer(context, connection),
        ClientMessage::StopTimer => stop_timer(context, connection),
        ClientMessage::WebrtcOffer(signal) => relay::forward_offer(context, connection, signal),
        ClientMessage::WebrtcAnswer(signal) => relay::forward_answer(context, connection, signal),
        ClientMessage::WebrtcIceCandidate(signal) => {
            relay::forward_ice_candidate(context, connection, signal)
        }
    }
}

fn create_room(context: &ServerContext, connection: &Connection, payload: CreateRoomPayload) {
    if let Err(err) = payload.validate() {
        connection.send(&ServerMessage::Ack(Ack::error("create-room", err)));
        return;
    }

    let room = context.collab.rooms.create_room(
        &connection.user_id,
        NewRoom {
            name: payload.name,
            description: payload.description,
            max_participants: payload.max_participants,
        },
    );

    connection.set_current_room(Some(room.id));
    connection.send(&ServerMessage::Ack(
        Ack::ok("create-room").with_room(room.to_serialized()),
    ));
}

fn join_room(context: &ServerContext, connection: &Connection, room_id: RoomId) {
    match context.collab.rooms.join_room(room_id, &connection.user_id) {
        Ok(room) => {
            connection.set_current_room(Some(room.id));
            connection.send(&ServerMessage::Ack(
                Ack::ok("join-room").with_room(room.to_serialized()),
            ));
        }
        Err(err) => connection.send(&ServerMessage::Ack(Ack::error("join-room", err))),
    }
}

fn leave_room(context: &ServerContext, connection: &Connection) {
    if let Some(room_id) = connection.current_room() {
        context.collab.rooms.leave_room(room_id, &connection.user_id);
        connection.set_current_room(None);
    }
}

fn toggle_mute(context: &ServerContext, connection: &Connection, desired: Option<bool>) {
    let Some(room_id) = connection.current_room() else {
        connection.send(&ServerMessage::Ack(Ack::error(
            "toggle-mute",
            ServerError::NotInRoom,
        )));
        return;
    };

    let ack = match context
        .collab
        .rooms
        .update_mute(room_id, &connection.user_id, desired)
    {
        Ok(participant) => Ack::ok("toggle-mute").with_mute(participant.is_muted),
        Err(err) => Ack::error("toggle-mute", err),
    };

    connection.send(&ServerMessage::Ack(ack));
}

/// Timer control is host-only.
fn authorize_host(context: &ServerContext, connection: &Connection) -> Result<RoomId, ServerError> {
    let room_id = connection.current_room().ok_or(ServerError::NotInRoom)?;

    let room = context
        .collab
        .rooms
        .room_by_id(room_id)
        .ok_or(ServerError::NotFound { resource: "Room" })?;

    if room.host_id != connection.user_id {
        return Err(ServerError::HostOnly);
    }

    Ok(room_id)
}

fn start_timer(context: &ServerContext, connection: &Connection, kind: SessionKind) {
    let ack = match authorize_host(context, connection).and_then(|room_id| {
        context
            .collab
            .timer
            .start(room_id, kind)
            .map_err(Into::into)
    }) {
        Ok(timer) => Ack::ok("start-timer").with_timer(timer.to_serialized()),
        Err(err) => Ack::error("start-timer", err),
    };

    connection.send(&ServerMessage::Ack(ack));
}

fn pause_timer(context: &ServerContext, connection: &Connection) {
    let ack = match authorize_host(context, connection).and_then(|room_id| {
        context
            .collab
            .timer
            .pause(room_id)
            .ok_or(ServerError::NotFound { resource: "Room" })
    }) {
        Ok(timer) => Ack::ok("pause-timer").with_timer(timer.to_serialized()),
        Err(err) => Ack::error("pause-timer", err),
    };

    connection.send(&ServerMessage::Ack(ack));
}

fn stop_timer(context: &ServerContext, connection: &Connection) {
    let ack = match authorize_host(context, connection).and_then(|room_id| {
        context
            .collab
            .timer
            .stop(room_id)
            .ok_or(ServerError::NotFound { resource: "Room" })
    }) {
        Ok(timer) => Ack::ok("stop-timer").with_timer(timer.to_serialized()),
        Err(err) => Ack::error("stop-timer", err),
    };

    connection.send(&ServerMessage::Ack(ack));
}

/// Fans collab events out to the affected connections. Room-scoped events go
/// to the room's members; room creation goes to everyone so listings refresh.
/// The acting user is skipped where they already got the result through
/// their acknowledgment.
pub async fn run_event_pump(context: ServerContext, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        dispatch_event(&context, event);
    }
}

fn dispatch_event(context: &ServerContext, event: CollabEvent) {
    let connections = &context.connections;

    match event {
        CollabEvent::RoomCreated { room } => {
            connections.broadcast_all(
                Some(&room.host_id),
                &ServerMessage::RoomCreated {
                    room: room.to_serialized(),
                },
            );
        }
        CollabEvent::UserJoined {
            room_id,
            user_id,
            participants,
        } => {
            connections.broadcast_room(
                room_id,
                Some(&user_id),
                &ServerMessage::UserJoined {
                    user_id: user_id.clone(),
                    participants: participants.to_serialized(),
                },
            );
        }
        CollabEvent::UserLeft {
            room_id,
            user_id,
            participants,
        } => {
            connections.broadcast_room(
                room_id,
                Some(&user_id),
                &ServerMessage::UserLeft {
                    user_id: user_id.clone(),
                    participants: participants.to_serialized(),
                },
            );
        }
        CollabEvent::UserMuteChanged {
            room_id,
            user_id,
            is_muted,
        } => {
            connections.broadcast_room(
                room_id,
                Some(&user_id),
                &ServerMessage::UserMuteChanged {
                    user_id: user_id.clone(),
                    is_muted,
                },
            );
        }
        CollabEvent::TimerStarted { room_id, timer } => {
            connections.broadcast_room(
                room_id,
                None,
                &ServerMessage::TimerStarted {
                    timer: timer.to_serialized(),
                },
            );
        }
        CollabEvent::TimerUpdate {
            room_id,
            time_remaining,
            kind,
            session_count,
        } => {
            connections.broadcast_room(
                room_id,
                None,
                &ServerMessage::TimerUpdate {
                    time_remaining,
                    kind,
                    session_count,
                },
            );
        }
        CollabEvent::TimerPaused { room_id, timer } => {
            connections.broadcast_room(
                room_id,
                None,
                &ServerMessage::TimerPaused {
                    timer: timer.to_serialized(),
                },
            );
        }
        CollabEvent::TimerStopped { room_id, timer } => {
            connections.broadcast_room(
                room_id,
                None,
                &ServerMessage::TimerStop {
                    timer: timer.to_serialized(),
                },
            );
        }
        CollabEvent::TimerCompleted {
            room_id,
            kind,
            session_count,
        } => {
            connections.broadcast_room(
                room_id,
                None,
                &ServerMessage::TimerCompleted {
                    kind,
                    session_count,
                },
            );
        }
    }
}
