//! Stateless pass-through for peer negotiation messages. Payloads are opaque
//! to the server: they are forwarded to the addressed connection, tagged with
//! the sender's id, and silently dropped when the target isn't connected.
//!
//! There is deliberately no check that sender and target share a room;
//! negotiation correctness is entirely the concern of the two endpoints.

use log::debug;
use serde_json::Value;

use crate::{
    context::ServerContext,
    gateway::Connection,
    protocol::{ServerMessage, SignalPayload},
};

pub fn forward_offer(context: &ServerContext, sender: &Connection, signal: SignalPayload) {
    forward(context, sender, signal, |from_user_id, payload| {
        ServerMessage::WebrtcOffer {
            from_user_id,
            payload,
        }
    });
}

pub fn forward_answer(context: &ServerContext, sender: &Connection, signal: SignalPayload) {
    forward(context, sender, signal, |from_user_id, payload| {
        ServerMessage::WebrtcAnswer {
            from_user_id,
            payload,
        }
    });
}

pub fn forward_ice_candidate(context: &ServerContext, sender: &Connection, signal: SignalPayload) {
    forward(context, sender, signal, |from_user_id, payload| {
        ServerMessage::WebrtcIceCandidate {
            from_user_id,
            payload,
        }
    });
}

fn forward(
    context: &ServerContext,
    sender: &Connection,
    signal: SignalPayload,
    message: impl FnOnce(String, Value) -> ServerMessage,
) {
    let delivered = context.connections.send_to_user(
        &signal.target_user_id,
        &message(sender.user_id.clone(), signal.payload),
    );

    if !delivered {
        debug!(
            "Dropping signal addressed to {}: no such connection",
            signal.target_user_id
        );
    }
}
