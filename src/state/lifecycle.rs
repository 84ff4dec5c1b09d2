//! Joining and leaving rooms

use super::AppState;
use crate::connection::Connection;
use crate::identity::Identity;
use crate::membership::MembershipError;
use crate::protocol::ServerMessage;
use crate::registry::{Registration, RegistryError};
use crate::store::JoinedState;
use crate::types::*;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error(transparent)]
    RoomFull(#[from] RegistryError),

    #[error("join refused: {0}")]
    Refused(#[from] MembershipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinReport {
    pub room_id: RoomId,
    /// This join created the room
    pub created: bool,
}

impl AppState {
    /// Attach a connection to a room, creating the room (and its countdown)
    /// if it does not exist yet
    pub async fn join_room(
        self: &Arc<Self>,
        conn: &Connection,
        room_id: RoomId,
    ) -> Result<JoinReport, JoinError> {
        let identity = &conn.identity;
        self.membership.authorize_join(room_id, identity).await?;

        let _gate = self.gate.lock().await;
        let registration = self.connections.register(room_id, conn.clone()).await?;

        let countdown = self.config.countdown();
        let joined = self
            .rooms
            .join(room_id, identity.id, self.config.initial_lives)
            .await;

        match joined {
            JoinedState::Created { session } => {
                tracing::info!("Room {} created by player {}", room_id, identity.id);
                let state = Arc::clone(self);
                self.timers
                    .start_countdown(room_id, countdown, async move {
                        state.on_countdown_elapsed(room_id, session).await;
                    })
                    .await;
                self.connections
                    .broadcast(
                        room_id,
                        &ServerMessage::TimerStarted {
                            room_id,
                            duration: countdown.as_secs(),
                        },
                    )
                    .await;
            }
            JoinedState::Added | JoinedState::AlreadyPresent => {
                let remaining = self.timers.remaining_countdown(room_id).await;
                if remaining > 0 {
                    conn.send(ServerMessage::TimerStarted {
                        room_id,
                        duration: remaining,
                    });
                }
            }
        }

        // A replaced connection was never announced as gone. Players coming
        // back after a leave are announced even though they stay on the
        // roster.
        if registration == Registration::Added {
            self.connections
                .broadcast(
                    room_id,
                    &ServerMessage::UserJoined {
                        room_id,
                        user_id: identity.id,
                        user_name: identity.name.clone(),
                    },
                )
                .await;
        }

        tracing::info!("Player {} ({}) joined room {}", identity.id, identity.name, room_id);
        Ok(JoinReport {
            room_id,
            created: matches!(joined, JoinedState::Created { .. }),
        })
    }

    /// Detach a connection from a room.
    ///
    /// Does nothing if `conn_id` is no longer the player's connection there
    /// (it was replaced by a reconnect). The last connection out removes the
    /// room state and cancels its timers.
    pub async fn leave_room(
        self: &Arc<Self>,
        room_id: RoomId,
        identity: &Identity,
        conn_id: ConnectionId,
    ) {
        {
            let _gate = self.gate.lock().await;
            let Some(remaining) = self
                .connections
                .unregister(room_id, identity.id, conn_id)
                .await
            else {
                return;
            };

            if remaining == 0 {
                self.timers.cancel_room(room_id).await;
                self.rooms.remove(room_id).await;
                tracing::info!("Room {} is empty, removed", room_id);
            } else {
                let engine = self.engine();
                let outcome = self
                    .rooms
                    .update(room_id, |room| engine.remove_player(room, identity.id))
                    .await;
                self.connections
                    .broadcast(
                        room_id,
                        &ServerMessage::UserLeft {
                            room_id,
                            user_id: identity.id,
                            user_name: identity.name.clone(),
                        },
                    )
                    .await;
                if let Some(outcome) = outcome {
                    self.dispatch(room_id, outcome).await;
                }
            }
        }

        tracing::info!("Player {} left room {}", identity.id, room_id);
        self.membership.record_leave(room_id, identity).await;
    }

    /// Relay typing text to everybody in the room, unchanged
    pub async fn relay_typing(&self, room_id: RoomId, player: PlayerId, text: String) {
        self.connections
            .broadcast(
                room_id,
                &ServerMessage::Typing {
                    room_id,
                    user_id: player,
                    text,
                },
            )
            .await;
    }
}
