//! # Matchforge
//!
//! Real-time TCP matchmaking and session server for a binary-protocol
//! game client.
//!
//! The server greets each connection with a handshake, tells the client
//! its observed endpoint, learns the client's UDP port through a
//! discovery datagram, queues searchers into fixed-capacity lobbies, and
//! — once every member has confirmed its peer connections — rolls teams,
//! colors, and music and broadcasts the match-start roster.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use matchforge::MatchServer;
//!
//! # async fn run() -> Result<(), matchforge::MatchforgeError> {
//! let server = MatchServer::builder()
//!     .bind("0.0.0.0:6510")
//!     .lobby_capacity(2)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use config::MatchConfig;
pub use error::MatchforgeError;
pub use server::{MatchServer, MatchServerBuilder, ServerHandle};

// Re-exports callers commonly need alongside the server.
pub use matchforge_lobby::{LobbyConfig, LobbyStatus};
pub use matchforge_wire::{FRAME_LEN, LobbyId, PacketBuffer, SessionId, build, opcode};
