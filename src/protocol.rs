//! Wire protocol
//!
//! Every frame is a JSON envelope `{"type": ..., "payload": {...}}`.
//! Inbound frames are decoded in two steps (envelope, then the typed payload
//! for that `type`) so a bad frame becomes a [`ProtocolError`] instead of
//! tearing down the connection.

use crate::types::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join { room_id: RoomId },
    Answer { answer: String },
    Leave,
    Typing { text: String },
    Ping { timestamp: i64, ping_id: Option<u64> },
    Pong { timestamp: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("missing payload for {0} message")]
    MissingPayload(&'static str),

    #[error("invalid payload for {kind} message: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct JoinPayload {
    room_id: RoomId,
}

#[derive(Deserialize)]
struct AnswerPayload {
    answer: String,
}

#[derive(Deserialize)]
struct TypingPayload {
    text: String,
}

#[derive(Deserialize)]
struct PingPayload {
    timestamp: i64,
    #[serde(default)]
    ping_id: Option<u64>,
}

#[derive(Deserialize)]
struct PongPayload {
    timestamp: i64,
}

fn payload<T: DeserializeOwned>(
    kind: &'static str,
    value: Option<serde_json::Value>,
) -> Result<T, ProtocolError> {
    let value = value
        .filter(|v| !v.is_null())
        .ok_or(ProtocolError::MissingPayload(kind))?;
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

        let msg = match envelope.kind.as_str() {
            "join" => {
                let p: JoinPayload = payload("join", envelope.payload)?;
                ClientMessage::Join { room_id: p.room_id }
            }
            "answer" => {
                let p: AnswerPayload = payload("answer", envelope.payload)?;
                ClientMessage::Answer { answer: p.answer }
            }
            "leave" => ClientMessage::Leave,
            "typing" => {
                let p: TypingPayload = payload("typing", envelope.payload)?;
                ClientMessage::Typing { text: p.text }
            }
            "ping" => {
                let p: PingPayload = payload("ping", envelope.payload)?;
                ClientMessage::Ping {
                    timestamp: p.timestamp,
                    ping_id: p.ping_id,
                }
            }
            "pong" => {
                let p: PongPayload = payload("pong", envelope.payload)?;
                ClientMessage::Pong {
                    timestamp: p.timestamp,
                }
            }
            _ => return Err(ProtocolError::UnknownType(envelope.kind)),
        };

        Ok(msg)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    UserJoined {
        room_id: RoomId,
        user_id: PlayerId,
        user_name: String,
    },
    UserLeft {
        room_id: RoomId,
        user_id: PlayerId,
        user_name: String,
    },
    /// Countdown until the game starts, in seconds
    TimerStarted {
        room_id: RoomId,
        duration: u64,
    },
    StartGame {
        room_id: RoomId,
        char_set: String,
        round: u32,
        time_limit: u32,
    },
    NextTurn {
        room_id: RoomId,
        user_id: PlayerId,
        char_set: String,
        time_limit: u32,
        round: u32,
        lives: u32,
    },
    /// Outcome of a submitted answer (accepted or rejected)
    Answer {
        room_id: RoomId,
        user_id: PlayerId,
        correct: bool,
        answer: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        char_set: Option<String>,
        score: u32,
        lives: u32,
    },
    TurnEnded {
        room_id: RoomId,
        user_id: PlayerId,
        reason: TurnEndReason,
        lives_left: u32,
        round: u32,
        score: u32,
    },
    GameOver {
        room_id: RoomId,
        winner_id: PlayerId,
        final_scores: BTreeMap<String, FinalScore>,
    },
    Typing {
        room_id: RoomId,
        user_id: PlayerId,
        text: String,
    },
    Ping {
        timestamp: i64,
        ping_id: u64,
    },
    Pong {
        timestamp: i64,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn final_score_key(player: PlayerId) -> String {
    format!("user_{}", player)
}
