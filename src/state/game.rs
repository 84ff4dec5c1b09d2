use super::AppState;
use crate::engine::{Outcome, TurnTicket};
use crate::types::*;
use futures::future::BoxFuture;
use std::sync::Arc;

impl AppState {
    /// Countdown callback. `session` ties it to the room state that started
    /// the countdown; a room recreated under the same id is left alone.
    pub(crate) async fn on_countdown_elapsed(self: &Arc<Self>, room_id: RoomId, session: SessionId) {
        let _gate = self.gate.lock().await;
        let engine = self.engine();
        let outcome = self
            .rooms
            .update(room_id, |room| {
                (room.session == session).then(|| engine.attempt_start(room))
            })
            .await
            .flatten();

        let Some(outcome) = outcome else {
            tracing::debug!("Countdown for room {} outlived its room", room_id);
            return;
        };
        self.timers.clear_countdown(room_id).await;
        self.dispatch(room_id, outcome).await;
    }

    /// Turn timer callback. Boxed because it re-arms itself through
    /// `dispatch`.
    pub(crate) fn on_turn_timeout(self: Arc<Self>, room_id: RoomId, ticket: TurnTicket) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let _gate = self.gate.lock().await;
            self.timers.clear_turn(room_id, ticket.seq).await;

            let engine = self.engine();
            let Some(outcome) = self
                .rooms
                .update(room_id, |room| engine.expire_turn(room, &ticket))
                .await
            else {
                return;
            };

            if outcome.is_empty() {
                tracing::debug!(
                    "Stale timeout for player {} in room {} (turn {})",
                    ticket.player,
                    room_id,
                    ticket.seq
                );
                return;
            }
            self.dispatch(room_id, outcome).await;
        })
    }

    pub async fn submit_answer(self: &Arc<Self>, room_id: RoomId, player: PlayerId, answer: &str) {
        let _gate = self.gate.lock().await;
        let engine = self.engine();
        let outcome = self
            .rooms
            .update(room_id, |room| engine.submit_answer(room, player, answer))
            .await;

        match outcome {
            Some(outcome) if !outcome.is_empty() => self.dispatch(room_id, outcome).await,
            _ => tracing::debug!(
                "Ignoring answer from player {} in room {}",
                player,
                room_id
            ),
        }
    }

    /// Broadcast an outcome and arm (or stop) the turn timer it implies.
    /// Caller holds the gate.
    pub(super) async fn dispatch(self: &Arc<Self>, room_id: RoomId, outcome: Outcome) {
        for msg in &outcome.messages {
            self.connections.broadcast(room_id, msg).await;
        }

        if outcome.game_over {
            self.timers.stop_turn(room_id).await;
            return;
        }

        if let Some(ticket) = outcome.turn {
            let on_timeout = Arc::clone(self).on_turn_timeout(room_id, ticket);
            self.timers
                .schedule_turn(room_id, ticket.seq, ticket.duration(), on_timeout)
                .await;
        }
    }
}
