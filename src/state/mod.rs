mod game;
mod lifecycle;

pub use lifecycle::{JoinError, JoinReport};

use crate::dictionary::Dictionary;
use crate::engine::Engine;
use crate::identity::GuestIdentities;
use crate::membership::{Membership, OpenMembership};
use crate::registry::ConnectionRegistry;
use crate::store::RoomStore;
use crate::timer::TimerManager;
use crate::types::*;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state
///
/// The room store and the connection registry are locked independently and
/// never nested. Messages are broadcast only after the store lock is released.
/// Every room mutation and the broadcast of its outcome run under `gate`, so
/// clients see events in the order they were applied.
pub struct AppState {
    pub config: GameConfig,
    pub keepalive: KeepaliveConfig,
    pub rooms: RoomStore,
    pub connections: ConnectionRegistry,
    pub timers: TimerManager,
    pub dictionary: Arc<dyn Dictionary>,
    pub membership: Arc<dyn Membership>,
    pub guests: GuestIdentities,
    turn_seq: AtomicU64,
    gate: Mutex<()>,
}

impl AppState {
    pub fn new(config: GameConfig, keepalive: KeepaliveConfig, dictionary: Arc<dyn Dictionary>) -> Self {
        Self {
            connections: ConnectionRegistry::new(config.max_room_capacity),
            config,
            keepalive,
            rooms: RoomStore::new(),
            timers: TimerManager::new(),
            dictionary,
            membership: Arc::new(OpenMembership),
            guests: GuestIdentities::new(),
            turn_seq: AtomicU64::new(0),
            gate: Mutex::new(()),
        }
    }

    pub fn with_membership(mut self, membership: Arc<dyn Membership>) -> Self {
        self.membership = membership;
        self
    }

    fn engine(&self) -> Engine<'_> {
        Engine::new(&self.config, self.dictionary.as_ref(), &self.turn_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, Outbound, Outbox};
    use crate::dictionary::WordList;
    use crate::identity::Identity;
    use crate::protocol::ServerMessage;
    use std::time::Duration;

    fn test_state() -> Arc<AppState> {
        let words = WordList::from_words(["the", "cathedral", "other", "bathe"]).unwrap();
        Arc::new(AppState::new(
            GameConfig::default(),
            KeepaliveConfig::default(),
            Arc::new(words),
        ))
    }

    fn player(id: PlayerId) -> (Connection, Outbox) {
        Connection::new(Identity::user(id, format!("p{}", id)))
    }

    fn drain(rx: &mut Outbox) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let Outbound::Message(msg) = item {
                out.push(msg);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_join_creates_room_and_countdown() {
        let state = test_state();
        let (a, mut rx) = player(1);

        let report = state.join_room(&a, 42).await.unwrap();
        assert!(report.created);

        let room = state.rooms.get(42).await.unwrap();
        assert_eq!(room.players, vec![1]);
        assert_eq!(room.phase, GamePhase::Waiting);
        assert!(state.timers.has_timers(42).await);

        let msgs = drain(&mut rx);
        assert!(msgs.contains(&ServerMessage::TimerStarted {
            room_id: 42,
            duration: 120
        }));
        assert!(msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::UserJoined { user_id: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_joiner_gets_remaining_countdown() {
        let state = test_state();
        let (a, mut rx_a) = player(1);
        let (b, mut rx_b) = player(2);

        state.join_room(&a, 42).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        state.join_room(&b, 42).await.unwrap();

        let msgs = drain(&mut rx_b);
        assert!(msgs.contains(&ServerMessage::TimerStarted {
            room_id: 42,
            duration: 90
        }));
        // Only the joiner is re-synced
        assert!(!drain(&mut rx_a)
            .iter()
            .any(|m| matches!(m, ServerMessage::TimerStarted { duration: 90, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_starts_game() {
        let state = test_state();
        let (a, mut rx_a) = player(1);
        let (b, _rx_b) = player(2);

        state.join_room(&a, 42).await.unwrap();
        state.join_room(&b, 42).await.unwrap();
        drain(&mut rx_a);

        tokio::time::sleep(Duration::from_secs(121)).await;

        let room = state.rooms.get(42).await.unwrap();
        assert_eq!(room.phase, GamePhase::InProgress);
        assert_eq!(room.current_player(), Some(1));

        let msgs = drain(&mut rx_a);
        assert!(matches!(msgs[0], ServerMessage::StartGame { round: 1, .. }));
        assert!(matches!(msgs[1], ServerMessage::NextTurn { user_id: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_timeout_costs_a_life() {
        let state = test_state();
        let (a, _rx_a) = player(1);
        let (b, _rx_b) = player(2);
        state.join_room(&a, 42).await.unwrap();
        state.join_room(&b, 42).await.unwrap();

        tokio::time::sleep(Duration::from_secs(121)).await;
        // First turn lasts 19 seconds
        tokio::time::sleep(Duration::from_secs(20)).await;

        let room = state.rooms.get(42).await.unwrap();
        assert_eq!(room.lives_of(1), 2);
        assert_eq!(room.current_player(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_leave_removes_room_and_timers() {
        let state = test_state();
        let (a, _rx) = player(1);
        state.join_room(&a, 42).await.unwrap();

        state.leave_room(42, &a.identity, a.id).await;

        assert!(state.rooms.get(42).await.is_none());
        assert!(!state.timers.has_timers(42).await);
        assert_eq!(state.connections.count_in_room(42).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_broadcasts_to_remaining_players() {
        let state = test_state();
        let (a, _rx_a) = player(1);
        let (b, mut rx_b) = player(2);
        state.join_room(&a, 42).await.unwrap();
        state.join_room(&b, 42).await.unwrap();
        drain(&mut rx_b);

        state.leave_room(42, &a.identity, a.id).await;

        let msgs = drain(&mut rx_b);
        assert_eq!(
            msgs,
            vec![ServerMessage::UserLeft {
                room_id: 42,
                user_id: 1,
                user_name: "p1".to_string()
            }]
        );
        assert_eq!(state.rooms.get(42).await.unwrap().lives_of(1), 0);
    }
}
