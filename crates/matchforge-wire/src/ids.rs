//! Identity types shared by every layer.
//!
//! Newtype wrappers keep a lobby id from being passed where a session id
//! is expected, even though both are small integers underneath. Sessions
//! and lobbies refer to each other by these plain identifiers, resolved
//! through the coordinator's registry — never by owning references.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A unique identifier for one connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Allocates the next process-unique session id.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for one lobby.
///
/// Lobby ids are small random numbers (they travel on the wire as a
/// `u16` in opcodes 6 and 7); the coordinator re-rolls collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LobbyId(pub u16);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_next_is_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(SessionId(7).to_string(), "S-7");
        assert_eq!(LobbyId(731).to_string(), "L-731");
    }

    #[test]
    fn test_ids_work_as_map_keys() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(LobbyId(1), "waiting");
        assert_eq!(map[&LobbyId(1)], "waiting");
    }
}
