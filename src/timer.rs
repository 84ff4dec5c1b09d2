//! Countdown and turn timers
//!
//! A timer is a spawned task that sleeps and then hands its callback to a
//! fresh task. Cancelling (aborting) only ever hits the sleep, never a
//! callback that is already mutating state.

use crate::types::RoomId;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct Countdown {
    deadline: Instant,
    handle: JoinHandle<()>,
}

struct TurnTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct RoomTimers {
    countdown: Option<Countdown>,
    turn: Option<TurnTimer>,
}

impl RoomTimers {
    fn is_empty(&self) -> bool {
        self.countdown.is_none() && self.turn.is_none()
    }
}

fn spawn_after<F>(duration: Duration, callback: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        tokio::spawn(callback);
    })
}

#[derive(Default)]
pub struct TimerManager {
    rooms: Mutex<HashMap<RoomId, RoomTimers>>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the pre-game countdown. Its deadline is the only
    /// record of when the game starts.
    pub async fn start_countdown<F>(&self, room_id: RoomId, duration: Duration, on_expire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + duration;
        let handle = spawn_after(duration, on_expire);

        let mut rooms = self.rooms.lock().await;
        let timers = rooms.entry(room_id).or_default();
        if let Some(previous) = timers.countdown.replace(Countdown { deadline, handle }) {
            previous.handle.abort();
        }
        tracing::debug!("Countdown for room {} started ({:?})", room_id, duration);
    }

    pub async fn stop_countdown(&self, room_id: RoomId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(timers) = rooms.get_mut(&room_id) {
            if let Some(countdown) = timers.countdown.take() {
                countdown.handle.abort();
            }
            if timers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Forget a countdown that already fired without aborting anything
    pub async fn clear_countdown(&self, room_id: RoomId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(timers) = rooms.get_mut(&room_id) {
            timers.countdown = None;
            if timers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Whole seconds left on the room's countdown, 0 if none is running
    pub async fn remaining_countdown(&self, room_id: RoomId) -> u64 {
        let rooms = self.rooms.lock().await;
        rooms
            .get(&room_id)
            .and_then(|timers| timers.countdown.as_ref())
            .map(|countdown| {
                countdown
                    .deadline
                    .saturating_duration_since(Instant::now())
                    .as_secs()
            })
            .unwrap_or(0)
    }

    /// Arm the timeout for turn `seq`.
    ///
    /// Replaces the running turn timer only if `seq` is newer, so a late
    /// scheduling call for an older turn can never cancel the current one.
    /// Returns whether the timer was armed.
    pub async fn schedule_turn<F>(&self, room_id: RoomId, seq: u64, duration: Duration, on_timeout: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut rooms = self.rooms.lock().await;
        let timers = rooms.entry(room_id).or_default();

        if timers.turn.as_ref().is_some_and(|t| t.seq >= seq) {
            tracing::debug!("Ignoring stale turn timer {} for room {}", seq, room_id);
            return false;
        }

        let handle = spawn_after(duration, on_timeout);
        if let Some(previous) = timers.turn.replace(TurnTimer { seq, handle }) {
            previous.handle.abort();
        }
        true
    }

    pub async fn stop_turn(&self, room_id: RoomId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(timers) = rooms.get_mut(&room_id) {
            if let Some(turn) = timers.turn.take() {
                turn.handle.abort();
            }
            if timers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Forget turn timer `seq` once it has fired. A newer timer is left alone.
    pub async fn clear_turn(&self, room_id: RoomId, seq: u64) {
        let mut rooms = self.rooms.lock().await;
        if let Some(timers) = rooms.get_mut(&room_id) {
            if timers.turn.as_ref().is_some_and(|t| t.seq == seq) {
                timers.turn = None;
            }
            if timers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Cancel everything pending for a room
    pub async fn cancel_room(&self, room_id: RoomId) {
        if let Some(timers) = self.rooms.lock().await.remove(&room_id) {
            if let Some(countdown) = timers.countdown {
                countdown.handle.abort();
            }
            if let Some(turn) = timers.turn {
                turn.handle.abort();
            }
            tracing::debug!("Cancelled timers for room {}", room_id);
        }
    }

    pub async fn has_timers(&self, room_id: RoomId) -> bool {
        self.rooms.lock().await.contains_key(&room_id)
    }
}
