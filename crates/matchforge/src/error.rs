//! Unified error type for the Matchforge server.

use matchforge_lobby::LobbyError;
use matchforge_session::SessionError;
use matchforge_wire::WireError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `matchforge` crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MatchforgeError {
    /// A socket-level error (bind, accept, read, write).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A wire-level error (frame encode/decode).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A session-level error (outbound queue gone).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A lobby-level error (full, not a member, actor stopped).
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}
