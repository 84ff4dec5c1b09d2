use super::keepalive::Keepalive;
use crate::connection::Connection;
use crate::identity::Identity;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::RoomId;
use std::sync::Arc;

/// Per-connection state owned by the read loop.
///
/// Dropping a session leaves its room and closes the connection, whichever
/// way the read loop ended.
pub struct Session {
    state: Arc<AppState>,
    conn: Connection,
    room: Option<RoomId>,
    pub(crate) keepalive: Keepalive,
}

impl Session {
    pub fn new(state: Arc<AppState>, conn: Connection) -> Self {
        let keepalive = Keepalive::new(state.keepalive.pong_timeout);
        Self {
            state,
            conn,
            room: None,
            keepalive,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.conn.identity
    }

    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    /// Queue a message for this connection only
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.conn.send(msg)
    }

    /// Join `room_id`, leaving the current room first if it is another one.
    /// Refusals are logged and otherwise ignored.
    pub async fn join(&mut self, room_id: RoomId) {
        if self.room.is_some_and(|current| current != room_id) {
            self.leave().await;
        }

        match self.state.join_room(&self.conn, room_id).await {
            Ok(_) => self.room = Some(room_id),
            Err(e) => {
                tracing::warn!(
                    "Player {} not admitted to room {}: {}",
                    self.conn.identity.id,
                    room_id,
                    e
                );
            }
        }
    }

    pub async fn leave(&mut self) {
        if let Some(room_id) = self.room.take() {
            self.state
                .leave_room(room_id, &self.conn.identity, self.conn.id)
                .await;
        }
    }

    /// Leave and close in place, instead of deferring to `Drop`
    pub async fn finish(mut self) {
        self.leave().await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(room_id) = self.room.take() {
            let state = Arc::clone(&self.state);
            let identity = self.conn.identity.clone();
            let conn_id = self.conn.id;
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        state.leave_room(room_id, &identity, conn_id).await;
                    });
                }
                Err(_) => tracing::error!(
                    "No runtime to clean up player {} in room {}",
                    identity.id,
                    room_id
                ),
            }
        }
        self.conn.close();
    }
}
