//! Room membership provider
//!
//! The room/membership records live outside this service. The game core only
//! asks whether a player may join a room and reports when they leave.

use crate::identity::Identity;
use crate::types::RoomId;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("player {player} is not allowed in room {room_id}")]
    NotAllowed { room_id: RoomId, player: String },

    #[error("membership lookup failed: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Membership: Send + Sync {
    async fn authorize_join(
        &self,
        room_id: RoomId,
        identity: &Identity,
    ) -> Result<(), MembershipError>;

    async fn record_leave(&self, room_id: RoomId, identity: &Identity);
}

/// Lets everybody into every room
#[derive(Debug, Default, Clone)]
pub struct OpenMembership;

#[async_trait]
impl Membership for OpenMembership {
    async fn authorize_join(
        &self,
        room_id: RoomId,
        identity: &Identity,
    ) -> Result<(), MembershipError> {
        tracing::debug!("Player {} joining room {}", identity.id, room_id);
        Ok(())
    }

    async fn record_leave(&self, room_id: RoomId, identity: &Identity) {
        tracing::debug!("Player {} left room {}", identity.id, room_id);
    }
}
