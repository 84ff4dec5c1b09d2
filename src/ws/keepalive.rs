//! Application-level ping/pong bookkeeping for one connection

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Keepalive {
    pong_timeout: Duration,
    pings_sent: u64,
    /// Set while a pong is outstanding
    deadline: Option<Instant>,
}

impl Keepalive {
    pub fn new(pong_timeout: Duration) -> Self {
        Self {
            pong_timeout,
            pings_sent: 0,
            deadline: None,
        }
    }

    /// Record an outgoing ping and (re)arm the pong deadline. Returns the
    /// ping id, counting from 1.
    pub fn ping_sent(&mut self, now: Instant) -> u64 {
        self.pings_sent += 1;
        self.deadline = Some(now + self.pong_timeout);
        self.pings_sent
    }

    pub fn pong_received(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Resolves at `deadline`, or never if there is none
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
