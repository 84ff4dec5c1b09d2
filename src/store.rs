//! In-memory room state store
//!
//! Guarded by its own lock, independent of the connection registry. Every
//! check-and-mutate on a room happens inside one `update` call; nothing in
//! here broadcasts or schedules timers.

use crate::types::*;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Result of attaching a player to a room's game state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinedState {
    /// The room did not exist; the player founded it
    Created { session: SessionId },
    /// Appended to (or revived in) an existing room
    Added,
    /// Already on the roster: a reconnect, or a player coming back to a
    /// running or finished game they left
    AlreadyPresent,
}

#[derive(Default)]
pub struct RoomStore {
    rooms: RwLock<HashMap<RoomId, RoomState>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_room(
        &self,
        room_id: RoomId,
        founder: PlayerId,
        initial_lives: u32,
    ) -> RoomState {
        let room = RoomState::new(room_id, founder, initial_lives);
        self.rooms.write().await.insert(room_id, room.clone());
        room
    }

    /// Snapshot of a room's state
    pub async fn get(&self, room_id: RoomId) -> Option<RoomState> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    pub async fn remove(&self, room_id: RoomId) -> Option<RoomState> {
        self.rooms.write().await.remove(&room_id)
    }

    pub async fn add_player(&self, room_id: RoomId, player: PlayerId, initial_lives: u32) -> bool {
        match self.rooms.write().await.get_mut(&room_id) {
            Some(room) => room.add_player(player, initial_lives),
            None => false,
        }
    }

    /// Create the room with `player` as founder, or add them to it
    pub async fn join(
        &self,
        room_id: RoomId,
        player: PlayerId,
        initial_lives: u32,
    ) -> JoinedState {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&room_id) {
            Some(room) => {
                if room.add_player(player, initial_lives) {
                    JoinedState::Added
                } else {
                    JoinedState::AlreadyPresent
                }
            }
            None => {
                let room = RoomState::new(room_id, player, initial_lives);
                let session = room.session;
                rooms.insert(room_id, room);
                JoinedState::Created { session }
            }
        }
    }

    /// Run `f` against the room under the write lock
    pub async fn update<R>(&self, room_id: RoomId, f: impl FnOnce(&mut RoomState) -> R) -> Option<R> {
        let mut rooms = self.rooms.write().await;
        rooms.get_mut(&room_id).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = RoomStore::new();
        let room = store.create_room(1, 10, 3).await;
        assert_eq!(room.created_by, 10);
        assert_eq!(room.phase, GamePhase::Waiting);

        assert!(store.get(1).await.is_some());
        assert!(store.remove(1).await.is_some());
        assert!(store.get(1).await.is_none());
    }

    #[tokio::test]
    async fn test_add_player_reports_new_joins_only() {
        let store = RoomStore::new();
        store.create_room(1, 10, 3).await;

        assert!(store.add_player(1, 11, 3).await);
        assert!(!store.add_player(1, 11, 3).await);
        assert!(!store.add_player(2, 11, 3).await);

        let room = store.get(1).await.unwrap();
        assert_eq!(room.players, vec![10, 11]);
    }

    #[tokio::test]
    async fn test_join_creates_then_adds() {
        let store = RoomStore::new();

        let created = store.join(1, 10, 3).await;
        assert!(matches!(created, JoinedState::Created { .. }));
        assert_eq!(store.join(1, 11, 3).await, JoinedState::Added);
        assert_eq!(store.join(1, 11, 3).await, JoinedState::AlreadyPresent);

        let room = store.get(1).await.unwrap();
        assert_eq!(room.players, vec![10, 11]);
        if let JoinedState::Created { session } = created {
            assert_eq!(room.session, session);
        }
    }

    #[tokio::test]
    async fn test_recreated_room_gets_new_session() {
        let store = RoomStore::new();
        let first = store.create_room(1, 10, 3).await;
        store.remove(1).await;
        let second = store.create_room(1, 10, 3).await;
        assert_ne!(first.session, second.session);
    }

    #[tokio::test]
    async fn test_update_missing_room() {
        let store = RoomStore::new();
        assert_eq!(store.update(1, |room| room.round).await, None);
    }
}
