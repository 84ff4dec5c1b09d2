//! WebSocket message dispatch
//!
//! Decoding failures and messages that make no sense in the current state
//! are logged and dropped; nothing here closes the connection.

use super::Session;
use crate::protocol::{ClientMessage, ServerMessage};

/// Decode a text frame and dispatch it
pub async fn handle_text(session: &mut Session, text: &str) {
    match ClientMessage::decode(text) {
        Ok(msg) => handle_message(session, msg).await,
        Err(e) => tracing::warn!(
            "Ignoring message from player {}: {}",
            session.identity().id,
            e
        ),
    }
}

pub async fn handle_message(session: &mut Session, msg: ClientMessage) {
    let player = session.identity().id;

    match msg {
        ClientMessage::Join { room_id } => {
            tracing::debug!("Join request from player {} for room {}", player, room_id);
            session.join(room_id).await;
        }

        ClientMessage::Answer { answer } => match session.room() {
            Some(room_id) => {
                session
                    .state()
                    .submit_answer(room_id, player, &answer)
                    .await;
            }
            None => tracing::debug!("Answer from player {} outside any room", player),
        },

        ClientMessage::Leave => session.leave().await,

        ClientMessage::Typing { text } => {
            if let Some(room_id) = session.room() {
                session.state().relay_typing(room_id, player, text).await;
            }
        }

        ClientMessage::Ping { timestamp, .. } => {
            session.send(ServerMessage::Pong { timestamp });
        }

        ClientMessage::Pong { .. } => {
            session.keepalive.pong_received();
        }
    }
}
