//! Error types for the session layer.

use matchforge_wire::SessionId;

/// Errors that can occur when operating on a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session's write task is gone — the client disconnected and the
    /// outbound queue can no longer be drained.
    #[error("session {0} is gone")]
    Gone(SessionId),
}
