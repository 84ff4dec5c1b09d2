//! Handle to one connected client
//!
//! Writes go through a bounded queue drained by the connection's writer
//! task, so frames to one socket never interleave and a slow socket never
//! blocks whoever is broadcasting. A client that lets its queue fill up is
//! disconnected.

use crate::identity::Identity;
use crate::protocol::ServerMessage;
use crate::types::ConnectionId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Messages a connection may have queued before it is considered stuck
pub const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum Outbound {
    Message(ServerMessage),
    Close,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    tx: mpsc::Sender<Outbound>,
    overflowed: Arc<AtomicBool>,
}

/// Receiving end of a connection's queue, owned by its writer
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Outbound>,
    overflowed: Arc<AtomicBool>,
}

impl Connection {
    pub fn new(identity: Identity) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let overflowed = Arc::new(AtomicBool::new(false));
        let conn = Self {
            id: ulid::Ulid::new(),
            identity,
            tx,
            overflowed: Arc::clone(&overflowed),
        };
        (conn, Outbox { rx, overflowed })
    }

    /// Queue a message; false once the writer side is gone or the queue is
    /// full. A full queue closes the connection.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match self.tx.try_send(Outbound::Message(msg)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Outbound queue full for player {} ({}), closing connection",
                    self.identity.id,
                    self.id
                );
                self.overflowed.store(true, Ordering::Release);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn close(&self) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(Outbound::Close) {
            self.overflowed.store(true, Ordering::Release);
        }
    }
}

impl Outbox {
    /// Next item to write. An overflowed queue yields `Close` ahead of
    /// whatever is still queued.
    pub async fn recv(&mut self) -> Option<Outbound> {
        if self.overflowed.swap(false, Ordering::AcqRel) {
            return Some(Outbound::Close);
        }
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Outbound, TryRecvError> {
        if self.overflowed.swap(false, Ordering::AcqRel) {
            return Ok(Outbound::Close);
        }
        self.rx.try_recv()
    }
}
