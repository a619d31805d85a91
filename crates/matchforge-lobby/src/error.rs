//! Error types for the lobby layer.

use matchforge_wire::{LobbyId, SessionId};

/// Errors that can occur during lobby operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The lobby is at capacity — no free member slot.
    ///
    /// This is the race between the matchmaking loop picking a waiting
    /// lobby and that lobby filling first; the caller re-queues the
    /// session and retries.
    #[error("lobby {0} is full")]
    Full(LobbyId),

    /// The session is not a member of this lobby.
    #[error("session {0} is not a member of lobby {1}")]
    NotMember(SessionId, LobbyId),

    /// The session retired (disconnected) before or during the join.
    ///
    /// A retired session can never confirm, so letting it in would wedge
    /// the lobby's quorum; the caller drops it instead of retrying.
    #[error("session {0} retired during the join")]
    Retired(SessionId),

    /// The lobby's command channel is closed — its control loop stopped.
    #[error("lobby {0} is unavailable")]
    Unavailable(LobbyId),

    /// Building a wire frame failed.
    #[error(transparent)]
    Wire(#[from] matchforge_wire::WireError),
}
