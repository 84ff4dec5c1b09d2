//! Player identity attached to a connection at upgrade time
//!
//! Authentication happens in front of this service; the upgrade request only
//! carries the resolved `user_id`/`user_name`. Callers without one get a guest
//! identity.

use crate::types::PlayerId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Guest ids start here so they never collide with account ids
pub const GUEST_ID_BASE: PlayerId = 1 << 48;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: PlayerId,
    pub name: String,
    pub guest: bool,
}

impl Identity {
    pub fn user(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            guest: false,
        }
    }
}

#[derive(Debug)]
pub struct GuestIdentities {
    next: AtomicU64,
}

impl Default for GuestIdentities {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(GUEST_ID_BASE),
        }
    }
}

impl GuestIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the identity of an upgrade request
    pub fn resolve(&self, user_id: Option<PlayerId>, user_name: Option<String>) -> Identity {
        let user_name = user_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        match user_id {
            Some(id) => {
                let name = user_name.unwrap_or_else(|| format!("user-{}", id));
                Identity::user(id, name)
            }
            None => {
                let id = self.next.fetch_add(1, Ordering::Relaxed);
                let name = user_name
                    .or_else(|| petname::petname(2, "-"))
                    .unwrap_or_else(|| format!("guest-{}", id - GUEST_ID_BASE));
                tracing::debug!("Assigned guest identity {} ({})", id, name);
                Identity {
                    id,
                    name,
                    guest: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_identity_passes_through() {
        let guests = GuestIdentities::new();
        let identity = guests.resolve(Some(12), Some(" Alice ".to_string()));
        assert_eq!(identity, Identity::user(12, "Alice"));
    }

    #[test]
    fn test_account_without_name_gets_placeholder() {
        let guests = GuestIdentities::new();
        assert_eq!(guests.resolve(Some(5), None).name, "user-5");
    }

    #[test]
    fn test_guests_get_distinct_ids_and_names() {
        let guests = GuestIdentities::new();
        let a = guests.resolve(None, None);
        let b = guests.resolve(None, Some("Bob".to_string()));

        assert!(a.guest && b.guest);
        assert!(a.id >= GUEST_ID_BASE);
        assert_ne!(a.id, b.id);
        assert!(!a.name.is_empty());
        assert_eq!(b.name, "Bob");
    }
}
