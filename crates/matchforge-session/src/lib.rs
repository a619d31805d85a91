//! Per-connection session state for Matchforge.
//!
//! A "session" is the server's record of one connected client. It tracks:
//!
//! - WHO the client is (remote address, TCP port, discovered UDP port)
//! - WHAT they're doing (searching, in a lobby, confirmed for a match)
//! - HOW to reach them (the ordered outbound frame queue)
//! - WHETHER they're still alive (a once-only retirement latch that makes
//!   disconnect idempotent)
//!
//! The session itself owns no socket and runs no loop — the coordinator
//! crate spawns the read/write tasks and hands each of them a clone of the
//! `Arc<ClientSession>`. Lobbies refer to sessions the same way, and refer
//! *back* only by plain `LobbyId` identifiers resolved through the
//! coordinator's registry, never by ownership.

mod error;
mod session;

pub use error::SessionError;
pub use session::ClientSession;
