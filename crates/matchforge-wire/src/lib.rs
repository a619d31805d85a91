//! Wire protocol for Matchforge.
//!
//! This crate defines the "language" that the game client and the
//! matchmaking server speak:
//!
//! - **Frames** — every TCP message occupies exactly one fixed-size frame
//!   ([`FRAME_LEN`] bytes), so the stream never needs resynchronizing.
//! - **[`PacketBuffer`]** — a fixed-capacity byte buffer with a seek cursor
//!   that reads and writes 16-bit integers and length-prefixed ASCII
//!   strings in a fixed, opcode-specific order.
//! - **[`opcode`]** — the catalog of 16-bit message-type discriminators.
//! - **Message builders** — one function per server→client message, so the
//!   field order of each opcode lives in exactly one place.
//!
//! The protocol layer sits below sessions and lobbies. It knows nothing
//! about connections or matchmaking — only how bytes are laid out.

mod buffer;
mod error;
mod ids;
mod message;

pub mod opcode;

pub use buffer::{FRAME_LEN, PacketBuffer};
pub use error::WireError;
pub use ids::{LobbyId, SessionId};
pub use message::{MatchStartEntry, build};
