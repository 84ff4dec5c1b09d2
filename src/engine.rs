//! Turn-based game rules
//!
//! The engine mutates a [`RoomState`] in place and reports what happened as
//! an [`Outcome`]: the messages to broadcast and, if a turn started, the
//! ticket for its timeout. It never touches sockets, locks or timers, so the
//! caller can run it under the store lock and act on the outcome afterwards.
//!
//! Phases: `Waiting` -> `InProgress` -> `Finished`.

use crate::dictionary::Dictionary;
use crate::protocol::{final_score_key, ServerMessage};
use crate::types::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Identifies one started turn; a timeout only applies if all fields still
/// match the room when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket {
    pub session: SessionId,
    pub seq: u64,
    pub turn_index: usize,
    pub player: PlayerId,
    pub time_limit: u32,
}

impl TurnTicket {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.time_limit))
    }
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub messages: Vec<ServerMessage>,
    /// Turn whose timeout has to be scheduled
    pub turn: Option<TurnTicket>,
    /// The game is over (now or already before this call)
    pub game_over: bool,
}

impl Outcome {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.turn.is_none()
    }
}

pub struct Engine<'a> {
    config: &'a GameConfig,
    dictionary: &'a dyn Dictionary,
    /// Source of turn sequence numbers, shared by all rooms
    turn_seq: &'a AtomicU64,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a GameConfig, dictionary: &'a dyn Dictionary, turn_seq: &'a AtomicU64) -> Self {
        Self {
            config,
            dictionary,
            turn_seq,
        }
    }

    /// Countdown elapsed: start the game and hand out the first turn
    pub fn attempt_start(&self, room: &mut RoomState) -> Outcome {
        let mut out = Outcome::default();
        if room.phase != GamePhase::Waiting {
            return out;
        }

        room.phase = GamePhase::InProgress;
        room.current_fragment = self.dictionary.random_fragment();
        room.round = 1;
        room.turn_index = 0;
        room.time_limit = self.config.time_limit_for(room.round);

        tracing::info!(
            "Room {} started with {} players",
            room.room_id,
            room.players.len()
        );
        out.messages.push(ServerMessage::StartGame {
            room_id: room.room_id,
            char_set: room.current_fragment.clone(),
            round: room.round,
            time_limit: room.time_limit,
        });

        if self.end_if_decided(room, &mut out) {
            return out;
        }

        let first = (0..room.players.len()).find(|&i| room.is_alive(room.players[i]));
        if let Some(index) = first {
            self.start_turn(room, index, &mut out);
        }
        out
    }

    pub fn advance_turn(&self, room: &mut RoomState) -> Outcome {
        let mut out = Outcome::default();
        self.advance(room, &mut out);
        out
    }

    /// Turn timer fired. Stale tickets (the turn already moved on, the room
    /// was recreated, the game ended) change nothing.
    pub fn expire_turn(&self, room: &mut RoomState, ticket: &TurnTicket) -> Outcome {
        let mut out = Outcome::default();
        let current = room.phase == GamePhase::InProgress
            && room.session == ticket.session
            && room.turn_seq == ticket.seq
            && room.turn_index == ticket.turn_index
            && room.players.get(room.turn_index) == Some(&ticket.player);
        if !current {
            return out;
        }

        let player = ticket.player;
        let lives_left = lose_life(room, player);
        tracing::debug!(
            "Player {} timed out in room {} ({} lives left)",
            player,
            room.room_id,
            lives_left
        );
        out.messages.push(ServerMessage::TurnEnded {
            room_id: room.room_id,
            user_id: player,
            reason: TurnEndReason::Timeout,
            lives_left,
            round: room.round,
            score: room.points_of(player),
        });

        self.advance(room, &mut out);
        out
    }

    /// Validate an answer from `player`. Only the active player may answer.
    pub fn submit_answer(&self, room: &mut RoomState, player: PlayerId, answer: &str) -> Outcome {
        let mut out = Outcome::default();
        if room.current_player() != Some(player) {
            return out;
        }

        let answer = answer.trim();
        let correct = !answer.is_empty()
            && self
                .dictionary
                .contains_fragment(answer, &room.current_fragment)
            && self.dictionary.is_valid_word(answer);

        if correct {
            room.current_fragment = self.dictionary.random_fragment();
            let score = {
                let points = room.points.entry(player).or_insert(0);
                *points += 1;
                *points
            };
            let lives = room.lives_of(player);

            out.messages.push(ServerMessage::Answer {
                room_id: room.room_id,
                user_id: player,
                correct: true,
                answer: answer.to_string(),
                char_set: Some(room.current_fragment.clone()),
                score,
                lives,
            });
            out.messages.push(ServerMessage::TurnEnded {
                room_id: room.room_id,
                user_id: player,
                reason: TurnEndReason::CorrectAnswer,
                lives_left: lives,
                round: room.round,
                score,
            });
            self.advance(room, &mut out);
            return out;
        }

        let lives_left = lose_life(room, player);
        let score = room.points_of(player);
        out.messages.push(ServerMessage::Answer {
            room_id: room.room_id,
            user_id: player,
            correct: false,
            answer: answer.to_string(),
            char_set: None,
            score,
            lives: lives_left,
        });
        out.messages.push(ServerMessage::TurnEnded {
            room_id: room.room_id,
            user_id: player,
            reason: TurnEndReason::WrongAnswer,
            lives_left,
            round: room.round,
            score,
        });

        if self.end_if_decided(room, &mut out) {
            return out;
        }
        // An eliminated player must not keep the turn
        if lives_left == 0 && room.current_player() == Some(player) {
            self.advance(room, &mut out);
        }
        out
    }

    /// A player left the room: they are out of the game
    pub fn remove_player(&self, room: &mut RoomState, player: PlayerId) -> Outcome {
        let mut out = Outcome::default();
        if !room.has_player(player) {
            return out;
        }

        match room.phase {
            GamePhase::Waiting => {
                room.lives.insert(player, 0);
            }
            GamePhase::InProgress => {
                let had_turn = room.current_player() == Some(player);
                room.lives.insert(player, 0);
                if had_turn {
                    self.advance(room, &mut out);
                } else {
                    self.end_if_decided(room, &mut out);
                }
            }
            GamePhase::Finished => {}
        }
        out
    }

    /// End the game if at most one player is alive. Calling it on a game
    /// that is already over reports `game_over` without broadcasting again.
    pub fn check_end_condition(&self, room: &mut RoomState) -> Outcome {
        let mut out = Outcome::default();
        self.end_if_decided(room, &mut out);
        out
    }

    fn advance(&self, room: &mut RoomState, out: &mut Outcome) {
        if room.phase != GamePhase::InProgress {
            return;
        }
        if self.end_if_decided(room, out) {
            return;
        }

        let count = room.players.len();
        let origin = room.turn_index;
        for step in 1..=count {
            let index = (origin + step) % count;
            if room.is_alive(room.players[index]) {
                // Landing at or before the origin means the pointer wrapped
                if index <= origin {
                    room.round += 1;
                }
                self.start_turn(room, index, out);
                return;
            }
        }
    }

    fn start_turn(&self, room: &mut RoomState, index: usize, out: &mut Outcome) {
        let player = room.players[index];
        room.turn_index = index;
        room.turn_seq = self.turn_seq.fetch_add(1, Ordering::Relaxed) + 1;
        room.time_limit = self.config.time_limit_for(room.round);
        room.current_fragment = self.dictionary.random_fragment();

        out.messages.push(ServerMessage::NextTurn {
            room_id: room.room_id,
            user_id: player,
            char_set: room.current_fragment.clone(),
            time_limit: room.time_limit,
            round: room.round,
            lives: room.lives_of(player),
        });
        out.turn = Some(TurnTicket {
            session: room.session,
            seq: room.turn_seq,
            turn_index: index,
            player,
            time_limit: room.time_limit,
        });
    }

    fn end_if_decided(&self, room: &mut RoomState, out: &mut Outcome) -> bool {
        match room.phase {
            GamePhase::Finished => {
                out.game_over = true;
                return true;
            }
            GamePhase::Waiting => return false,
            GamePhase::InProgress => {}
        }

        let alive: Vec<PlayerId> = room
            .players
            .iter()
            .copied()
            .filter(|p| room.is_alive(*p))
            .collect();
        if alive.len() > 1 {
            return false;
        }

        let winner = match alive.first() {
            Some(&survivor) => survivor,
            None => top_scorer(room),
        };

        room.phase = GamePhase::Finished;
        room.winner_id = Some(winner);
        out.turn = None;
        out.game_over = true;

        tracing::info!("Game in room {} over, winner {}", room.room_id, winner);
        out.messages.push(ServerMessage::GameOver {
            room_id: room.room_id,
            winner_id: winner,
            final_scores: final_scores(room),
        });
        true
    }
}

fn lose_life(room: &mut RoomState, player: PlayerId) -> u32 {
    let lives = room.lives.entry(player).or_insert(0);
    *lives = lives.saturating_sub(1);
    *lives
}

/// Highest score wins; ties go to whoever comes first in turn order
fn top_scorer(room: &RoomState) -> PlayerId {
    let mut best: Option<(PlayerId, u32)> = None;
    for &player in &room.players {
        let points = room.points_of(player);
        if best.is_none_or(|(_, top)| points > top) {
            best = Some((player, points));
        }
    }
    best.map(|(player, _)| player).unwrap_or(room.created_by)
}

pub fn final_scores(room: &RoomState) -> BTreeMap<String, FinalScore> {
    room.players
        .iter()
        .map(|&player| {
            (
                final_score_key(player),
                FinalScore {
                    points: room.points_of(player),
                    lives: room.lives_of(player),
                },
            )
        })
        .collect()
}
