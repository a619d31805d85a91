//! Lobby lifecycle management for Matchforge.
//!
//! Each lobby runs as an isolated Tokio task (actor model) that owns the
//! member list, the confirmation barrier, and the team-assignment step.
//! All joins, leaves, and confirmations arrive as commands over a channel,
//! so they can never interleave with an in-progress match-start broadcast
//! — the actor task is the lobby's lock.
//!
//! # Key types
//!
//! - [`LobbyHandle`] — send commands to a running lobby actor
//! - [`LobbyEvent`] — lifecycle callbacks the lobby emits to the coordinator
//! - [`LobbyStatus`] — the WAITING ⇄ READY state machine
//! - [`LobbyConfig`] — capacity and the tunable pacing/settle delays

mod config;
mod error;
mod lobby;
mod teams;

pub use config::{LobbyConfig, LobbyStatus};
pub use error::LobbyError;
pub use lobby::{LobbyEvent, LobbyHandle, LobbyInfo, spawn_lobby};
