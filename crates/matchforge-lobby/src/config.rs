//! Lobby configuration and status machine.

use std::ops::RangeInclusive;
use std::time::Duration;

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Configuration for a lobby instance.
///
/// Every delay here is a tunable, not a correctness requirement — tests
/// shrink them to keep the suite fast; production keeps values generous
/// enough for clients to finish their P2P negotiation.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Fixed member capacity (≥ 1). The lobby dispatches a match only
    /// when exactly this many members are present.
    pub capacity: usize,

    /// How often the control loop re-checks the fill/quorum condition.
    pub poll_interval: Duration,

    /// Pause between the per-incumbent "peer joined" broadcasts, so peers
    /// mid-negotiation aren't flooded.
    pub join_pacing: Duration,

    /// Settle delay before the roster message is sent to a new joiner.
    pub roster_settle: Duration,

    /// Settle delay between the fill condition holding and the match-start
    /// broadcast going out.
    pub ready_settle: Duration,

    /// Whether team assignment waits for every member's confirmation.
    /// `false` is the reduced configuration (quorum size 0): members are
    /// auto-confirmed on join and only the fill condition gates the match.
    pub require_confirmation: bool,

    /// Candidate color-combination ids for the match-start roll.
    pub color_ids: RangeInclusive<u16>,

    /// Candidate music-track ids for the match-start roll.
    pub music_ids: RangeInclusive<u16>,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            poll_interval: Duration::from_millis(10),
            join_pacing: Duration::from_millis(100),
            roster_settle: Duration::from_millis(700),
            ready_settle: Duration::from_millis(60),
            require_confirmation: true,
            color_ids: 1..=4,
            music_ids: 1..=2,
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a lobby.
///
/// ```text
/// Waiting ──(full + quorum)──→ Ready ──(match-start broadcast)──→ Waiting
/// ```
///
/// - **Waiting**: accepting members, control loop polling for fill.
/// - **Ready**: transient — team assignment and broadcast in progress.
///
/// A lobby is torn down (not transitioned) when its member count reaches
/// zero; emptiness is a removal condition, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyStatus {
    Waiting,
    Ready,
}

impl LobbyStatus {
    /// Returns `true` if the lobby is accepting new members.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl std::fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Ready => write!(f, "READY"),
        }
    }
}
