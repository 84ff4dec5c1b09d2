//! Connection registry: which connections sit in which room

use crate::connection::Connection;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("room {room_id} is full ({capacity} connections)")]
    RoomFull { room_id: RoomId, capacity: usize },
}

/// How a connection entered the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The player had no connection in the room
    Added,
    /// The player's previous connection was replaced (and closed)
    Replaced,
}

pub struct ConnectionRegistry {
    rooms: RwLock<HashMap<RoomId, HashMap<PlayerId, Connection>>>,
    capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Attach a connection to a room.
    ///
    /// A player who is already registered keeps their slot and the previous
    /// connection is closed. New players are refused once the room is full.
    pub async fn register(
        &self,
        room_id: RoomId,
        conn: Connection,
    ) -> Result<Registration, RegistryError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id).or_default();

        let player = conn.identity.id;
        if !room.contains_key(&player) && room.len() >= self.capacity {
            if room.is_empty() {
                rooms.remove(&room_id);
            }
            return Err(RegistryError::RoomFull {
                room_id,
                capacity: self.capacity,
            });
        }

        let conn_id = conn.id;
        match room.insert(player, conn) {
            Some(previous) => {
                if previous.id != conn_id {
                    tracing::info!(
                        "Player {} reconnected to room {}, closing previous connection",
                        player,
                        room_id
                    );
                    previous.close();
                }
                Ok(Registration::Replaced)
            }
            None => Ok(Registration::Added),
        }
    }

    /// Detach a player's connection from a room.
    ///
    /// Only removes the entry if it still belongs to `conn_id`, so cleanup of
    /// a replaced connection cannot evict the one that replaced it. Returns
    /// the number of connections left in the room, or `None` if nothing was
    /// removed. Empty rooms are dropped from the map.
    pub async fn unregister(
        &self,
        room_id: RoomId,
        player: PlayerId,
        conn_id: ConnectionId,
    ) -> Option<usize> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id)?;

        if room.get(&player).map(|c| c.id) != Some(conn_id) {
            return None;
        }
        room.remove(&player);

        let remaining = room.len();
        if remaining == 0 {
            rooms.remove(&room_id);
        }
        Some(remaining)
    }

    /// Queue a message for every connection in the room; returns how many
    /// connections accepted it
    pub async fn broadcast(&self, room_id: RoomId, msg: &ServerMessage) -> usize {
        let targets: Vec<Connection> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&room_id) {
                Some(room) => room.values().cloned().collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for conn in targets {
            if conn.send(msg.clone()) {
                delivered += 1;
            } else {
                tracing::warn!(
                    "Failed to queue message for player {} in room {}",
                    conn.identity.id,
                    room_id
                );
            }
        }
        delivered
    }

    pub async fn count_in_room(&self, room_id: RoomId) -> usize {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }

    pub async fn contains(&self, room_id: RoomId, player: PlayerId) -> bool {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .is_some_and(|room| room.contains_key(&player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Outbound, Outbox};
    use crate::identity::Identity;

    fn conn(id: PlayerId) -> (Connection, Outbox) {
        Connection::new(Identity::user(id, format!("p{}", id)))
    }

    #[tokio::test]
    async fn test_register_and_count() {
        let registry = ConnectionRegistry::new(10);
        let (a, _rx_a) = conn(1);
        let (b, _rx_b) = conn(2);

        registry.register(5, a).await.unwrap();
        registry.register(5, b).await.unwrap();

        assert_eq!(registry.count_in_room(5).await, 2);
        assert_eq!(registry.count_in_room(6).await, 0);
    }

    #[tokio::test]
    async fn test_room_capacity() {
        let registry = ConnectionRegistry::new(2);
        let (a, _rx_a) = conn(1);
        let (b, _rx_b) = conn(2);
        let (c, _rx_c) = conn(3);

        registry.register(5, a).await.unwrap();
        registry.register(5, b).await.unwrap();
        let err = registry.register(5, c).await.unwrap_err();

        assert_eq!(
            err,
            RegistryError::RoomFull {
                room_id: 5,
                capacity: 2
            }
        );
        assert_eq!(registry.count_in_room(5).await, 2);
        assert!(!registry.contains(5, 3).await);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_and_closes_previous() {
        let registry = ConnectionRegistry::new(1);
        let (first, mut first_rx) = conn(1);
        let (second, _second_rx) = conn(1);
        let first_id = first.id;

        assert_eq!(registry.register(5, first).await, Ok(Registration::Added));
        // Same player does not count against capacity
        assert_eq!(registry.register(5, second).await, Ok(Registration::Replaced));

        assert!(matches!(first_rx.recv().await, Some(Outbound::Close)));
        // Stale cleanup of the first connection is ignored
        assert_eq!(registry.unregister(5, 1, first_id).await, None);
        assert_eq!(registry.count_in_room(5).await, 1);
    }

    #[tokio::test]
    async fn test_register_after_unregister_is_added() {
        let registry = ConnectionRegistry::new(10);
        let (first, _rx_first) = conn(1);
        let (second, _rx_second) = conn(1);
        let (other, _rx_other) = conn(2);
        let first_id = first.id;

        registry.register(5, other).await.unwrap();
        registry.register(5, first).await.unwrap();
        registry.unregister(5, 1, first_id).await;

        assert_eq!(registry.register(5, second).await, Ok(Registration::Added));
    }

    #[tokio::test]
    async fn test_unregister_drops_empty_room() {
        let registry = ConnectionRegistry::new(10);
        let (a, _rx_a) = conn(1);
        let (b, _rx_b) = conn(2);
        let (a_id, b_id) = (a.id, b.id);

        registry.register(5, a).await.unwrap();
        registry.register(5, b).await.unwrap();

        assert_eq!(registry.unregister(5, 1, a_id).await, Some(1));
        assert_eq!(registry.unregister(5, 2, b_id).await, Some(0));
        assert!(registry.rooms.read().await.get(&5).is_none());
        assert_eq!(registry.unregister(5, 2, b_id).await, None);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_room_members() {
        let registry = ConnectionRegistry::new(10);
        let (a, mut rx_a) = conn(1);
        let (b, mut rx_b) = conn(2);
        let (other, mut rx_other) = conn(3);

        registry.register(5, a).await.unwrap();
        registry.register(5, b).await.unwrap();
        registry.register(6, other).await.unwrap();

        let msg = ServerMessage::Typing {
            room_id: 5,
            user_id: 1,
            text: "hi".to_string(),
        };
        assert_eq!(registry.broadcast(5, &msg).await, 2);

        assert!(matches!(rx_a.recv().await, Some(Outbound::Message(m)) if m == msg));
        assert!(matches!(rx_b.recv().await, Some(Outbound::Message(m)) if m == msg));
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_skips_dead_connections() {
        let registry = ConnectionRegistry::new(10);
        let (a, rx_a) = conn(1);
        let (b, _rx_b) = conn(2);
        registry.register(5, a).await.unwrap();
        registry.register(5, b).await.unwrap();
        drop(rx_a);

        let msg = ServerMessage::Pong { timestamp: 0 };
        assert_eq!(registry.broadcast(5, &msg).await, 1);
    }
}
