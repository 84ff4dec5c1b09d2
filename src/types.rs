use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Opaque ID types for type safety
pub type RoomId = u64;
pub type PlayerId = u64;
pub type SessionId = ulid::Ulid;
pub type ConnectionId = ulid::Ulid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    /// Pre-game countdown is running
    Waiting,
    InProgress,
    /// Terminal, the room may linger for late broadcasts
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnEndReason {
    Timeout,
    CorrectAnswer,
    WrongAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub countdown_secs: u64,
    /// Per-turn time limit is `max(turn_time_ceiling - round, turn_time_floor)`
    pub turn_time_ceiling: u32,
    pub turn_time_floor: u32,
    pub initial_lives: u32,
    pub max_room_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 120,
            turn_time_ceiling: 20,
            turn_time_floor: 5,
            initial_lives: 3,
            max_room_capacity: 10,
        }
    }
}

impl GameConfig {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn time_limit_for(&self, round: u32) -> u32 {
        self.turn_time_ceiling
            .saturating_sub(round)
            .max(self.turn_time_floor)
    }
}

#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

/// Final standing of one player, keyed as `user_<id>` in `game_over`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalScore {
    pub points: u32,
    pub lives: u32,
}

/// Authoritative game state of one room.
///
/// `players` is the turn order. It only ever grows, so `turn_index` stays
/// valid when somebody is eliminated or leaves. `lives` and `points` always
/// hold exactly the ids in `players`.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room_id: RoomId,
    /// Distinguishes this state from an earlier one that used the same room id
    pub session: SessionId,
    pub created_by: PlayerId,
    pub players: Vec<PlayerId>,
    pub lives: HashMap<PlayerId, u32>,
    pub points: HashMap<PlayerId, u32>,
    pub phase: GamePhase,
    pub turn_index: usize,
    /// Bumped for every started turn; used to recognise stale turn timers
    pub turn_seq: u64,
    pub current_fragment: String,
    pub round: u32,
    pub time_limit: u32,
    pub winner_id: Option<PlayerId>,
}

impl RoomState {
    pub fn new(room_id: RoomId, founder: PlayerId, initial_lives: u32) -> Self {
        Self {
            room_id,
            session: ulid::Ulid::new(),
            created_by: founder,
            players: vec![founder],
            lives: HashMap::from([(founder, initial_lives)]),
            points: HashMap::from([(founder, 0)]),
            phase: GamePhase::Waiting,
            turn_index: 0,
            turn_seq: 0,
            current_fragment: String::new(),
            round: 0,
            time_limit: 0,
            winner_id: None,
        }
    }

    pub fn started(&self) -> bool {
        self.phase == GamePhase::InProgress
    }

    pub fn lives_of(&self, player: PlayerId) -> u32 {
        self.lives.get(&player).copied().unwrap_or(0)
    }

    pub fn points_of(&self, player: PlayerId) -> u32 {
        self.points.get(&player).copied().unwrap_or(0)
    }

    pub fn is_alive(&self, player: PlayerId) -> bool {
        self.lives_of(player) > 0
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.lives.contains_key(&player)
    }

    /// Player whose turn it is, only meaningful while in progress
    pub fn current_player(&self) -> Option<PlayerId> {
        if !self.started() {
            return None;
        }
        self.players.get(self.turn_index).copied()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| self.is_alive(**p)).count()
    }

    /// Add a player at the end of the turn order.
    ///
    /// Returns whether the player counts as newly joined. A player who left
    /// during the countdown is revived with full lives and reported as new;
    /// anyone else already present is left untouched.
    pub fn add_player(&mut self, player: PlayerId, initial_lives: u32) -> bool {
        match self.lives.get_mut(&player) {
            Some(lives) if self.phase == GamePhase::Waiting && *lives == 0 => {
                *lives = initial_lives;
                true
            }
            Some(_) => false,
            None => {
                self.players.push(player);
                self.lives.insert(player, initial_lives);
                self.points.insert(player, 0);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_limit_shrinks_per_round_down_to_floor() {
        let config = GameConfig::default();
        assert_eq!(config.time_limit_for(1), 19);
        assert_eq!(config.time_limit_for(10), 10);
        assert_eq!(config.time_limit_for(15), 5);
        assert_eq!(config.time_limit_for(40), 5);
    }

    #[test]
    fn test_add_player_keeps_maps_in_sync() {
        let mut room = RoomState::new(7, 1, 3);
        assert!(room.add_player(2, 3));
        assert!(!room.add_player(2, 3));

        assert_eq!(room.players, vec![1, 2]);
        assert_eq!(room.lives.len(), 2);
        assert_eq!(room.points.len(), 2);
        assert_eq!(room.points_of(2), 0);
    }

    #[test]
    fn test_add_player_revives_only_during_countdown() {
        let mut room = RoomState::new(7, 1, 3);
        room.add_player(2, 3);
        room.lives.insert(2, 0);
        assert!(room.add_player(2, 3));
        assert_eq!(room.lives_of(2), 3);

        room.lives.insert(2, 0);
        room.phase = GamePhase::InProgress;
        assert!(!room.add_player(2, 3));
        assert_eq!(room.lives_of(2), 0);
        assert_eq!(room.players, vec![1, 2]);
    }
}
