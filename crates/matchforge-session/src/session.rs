//! The `ClientSession` type: one connected client's server-side record.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use matchforge_wire::{LobbyId, PacketBuffer, SessionId};

use crate::SessionError;

/// Mutable per-session state.
///
/// Guarded by a plain `std::sync::Mutex` — every access is a short
/// read-or-write of a few fields and the lock is never held across an
/// `.await`. Fields in the "lobby" group are written only by the owning
/// lobby's actor task, which serializes them; the mutex makes the
/// cross-task reads sound.
#[derive(Debug, Default)]
struct SessionState {
    /// UDP port learned from the discovery datagram, if any yet.
    udp_port: Option<u16>,
    /// 1-based slot number within the current lobby.
    client_number: Option<u16>,
    /// Client asked for matchmaking and is queued.
    is_searching: bool,
    /// Client is a member of a lobby.
    is_in_game: bool,
    /// Client reported its P2P negotiation complete this match cycle.
    peer_confirmed: bool,
    /// Assigned team for the current match: 0 = unassigned, else 1 or 2.
    team: u16,
    /// 0-based slot within the assigned team.
    team_position: u16,
    /// The owning lobby, as a plain identifier. Resolved through the
    /// coordinator's registry when a handle is needed.
    lobby: Option<LobbyId>,
}

/// One connected client.
///
/// Shared as `Arc<ClientSession>` between the read task, the write task,
/// the owning lobby's actor, and the coordinator's loops. The outbound
/// queue is an unbounded channel: enqueuing never blocks, and the single
/// write task drains it in enqueue order, so enqueue order is wire order.
#[derive(Debug)]
pub struct ClientSession {
    id: SessionId,
    address: String,
    tcp_port: u16,
    outbound: mpsc::UnboundedSender<PacketBuffer>,
    cancel: CancellationToken,
    alive: AtomicBool,
    state: Mutex<SessionState>,
}

impl ClientSession {
    /// Creates a session record for a freshly accepted connection.
    ///
    /// `outbound` is the sending half of the write task's queue; `cancel`
    /// is the token both connection loops watch.
    pub fn new(
        address: String,
        tcp_port: u16,
        outbound: mpsc::UnboundedSender<PacketBuffer>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: SessionId::next(),
            address,
            tcp_port,
            outbound,
            cancel,
            alive: AtomicBool::new(true),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// This session's unique id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The client's remote IP address, as text.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The client's remote TCP port.
    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    /// The `"address:tcp_port"` string the client echoes in its UDP
    /// discovery datagram. Binds discovery to this session rather than to
    /// the address alone, so clients behind a shared NAT can't be confused
    /// for one another.
    pub fn identity_string(&self) -> String {
        format!("{}:{}", self.address, self.tcp_port)
    }

    /// Appends a frame to the outbound FIFO. Never blocks.
    ///
    /// # Errors
    /// [`SessionError::Gone`] if the write task has already exited.
    pub fn enqueue(&self, frame: PacketBuffer) -> Result<(), SessionError> {
        self.outbound
            .send(frame)
            .map_err(|_| SessionError::Gone(self.id))
    }

    /// The cancellation token watched by this session's read/write tasks.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the session has not been retired yet.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Flips the liveness latch. Returns `true` exactly once — the caller
    /// that wins performs teardown, every later caller is a no-op. This is
    /// what makes disconnect idempotent from any task.
    pub fn retire(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }

    // -- matchmaking flags --------------------------------------------------

    /// Marks the session as queued for matchmaking.
    /// `is_searching` and `is_in_game` are mutually exclusive.
    pub fn begin_search(&self) {
        let mut state = self.state.lock().expect("session state lock");
        state.is_searching = true;
        state.is_in_game = false;
    }

    /// Whether the session is queued for matchmaking.
    pub fn is_searching(&self) -> bool {
        self.state.lock().expect("session state lock").is_searching
    }

    /// Whether the session is a member of a lobby.
    pub fn is_in_game(&self) -> bool {
        self.state.lock().expect("session state lock").is_in_game
    }

    // -- lobby membership (written by the owning lobby's actor) -------------

    /// Records lobby membership: the owning lobby id and the 1-based slot.
    pub fn enter_lobby(&self, lobby: LobbyId, client_number: u16) {
        let mut state = self.state.lock().expect("session state lock");
        state.lobby = Some(lobby);
        state.client_number = Some(client_number);
        state.is_in_game = true;
        state.is_searching = false;
    }

    /// Clears all lobby-scoped fields (membership, slot, team assignment).
    pub fn leave_lobby(&self) {
        let mut state = self.state.lock().expect("session state lock");
        state.lobby = None;
        state.client_number = None;
        state.is_in_game = false;
        state.peer_confirmed = false;
        state.team = 0;
        state.team_position = 0;
    }

    /// The owning lobby's id, if any.
    pub fn lobby(&self) -> Option<LobbyId> {
        self.state.lock().expect("session state lock").lobby
    }

    /// The 1-based slot number within the current lobby, if any.
    pub fn client_number(&self) -> Option<u16> {
        self.state.lock().expect("session state lock").client_number
    }

    /// Marks this session's P2P negotiation as confirmed for this cycle.
    pub fn mark_confirmed(&self) {
        self.state.lock().expect("session state lock").peer_confirmed = true;
    }

    /// Resets the confirmation flag for the next match cycle.
    pub fn clear_confirmed(&self) {
        self.state.lock().expect("session state lock").peer_confirmed = false;
    }

    /// Whether this session has confirmed P2P negotiation this cycle.
    pub fn is_confirmed(&self) -> bool {
        self.state.lock().expect("session state lock").peer_confirmed
    }

    /// Records the team assignment for the current match.
    pub fn assign_team(&self, team: u16, position: u16) {
        let mut state = self.state.lock().expect("session state lock");
        state.team = team;
        state.team_position = position;
    }

    /// The assigned `(team, position)` pair. Team 0 means unassigned.
    pub fn team_assignment(&self) -> (u16, u16) {
        let state = self.state.lock().expect("session state lock");
        (state.team, state.team_position)
    }

    // -- UDP discovery -------------------------------------------------------

    /// Records the UDP port discovered from the client's datagram.
    pub fn set_udp_port(&self, port: u16) {
        self.state.lock().expect("session state lock").udp_port = Some(port);
    }

    /// The discovered UDP port, or 0 if discovery never completed.
    pub fn udp_port(&self) -> u16 {
        self.state
            .lock()
            .expect("session state lock")
            .udp_port
            .unwrap_or(0)
    }
}
