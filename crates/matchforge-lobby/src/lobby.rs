//! Lobby actor: an isolated Tokio task that owns one lobby.
//!
//! Each lobby runs in its own task, communicating with the outside world
//! through an mpsc channel. Joins, leaves, and confirmations are applied
//! one at a time between poll ticks, so none of them can interleave with
//! an in-progress match-start broadcast.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use matchforge_session::ClientSession;
use matchforge_wire::{LobbyId, MatchStartEntry, SessionId, build};

use crate::{LobbyConfig, LobbyError, LobbyStatus, teams};

/// Command channel depth per lobby. Senders wait when it fills.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Lifecycle callbacks a lobby emits to whoever spawned it.
///
/// The coordinator uses these to maintain its waiting list: a `Filled`
/// lobby stops receiving matchmaking assignments, a `Reaccepting` one
/// goes back on the list, an `Empty` one is dropped (the actor has
/// already stopped by the time `Empty` is observed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyEvent {
    /// The lobby reached capacity and dispatched a match.
    Filled(LobbyId),
    /// A member left a previously full lobby; it has free slots again.
    Reaccepting(LobbyId),
    /// The last member left; the actor has stopped.
    Empty(LobbyId),
}

/// Commands sent to a lobby actor through its channel.
///
/// Each variant is an operation the outside world can request. The
/// `oneshot::Sender` in some variants is a reply channel — the caller
/// sends a command and waits for the response on it.
pub(crate) enum LobbyCommand {
    /// Add a member that still owes a P2P confirmation.
    JoinUnconfirmed {
        session: Arc<ClientSession>,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    /// Add a member whose confirmation is taken as already given.
    JoinConfirmed {
        session: Arc<ClientSession>,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    /// Record a member's P2P confirmation.
    Confirm { session: SessionId },

    /// Remove a member.
    Remove {
        session: SessionId,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    /// Request a snapshot of lobby metadata.
    GetInfo { reply: oneshot::Sender<LobbyInfo> },

    /// Shut down the lobby.
    Shutdown,
}

/// A snapshot of lobby metadata.
#[derive(Debug, Clone)]
pub struct LobbyInfo {
    /// The lobby's unique id.
    pub lobby_id: LobbyId,
    /// Current lifecycle status.
    pub status: LobbyStatus,
    /// Number of members currently present.
    pub member_count: usize,
    /// Fixed member capacity.
    pub capacity: usize,
    /// Total confirmations recorded over the lobby's lifetime.
    pub confirmations: u64,
}

/// Handle to a running lobby actor. Used to send commands to it.
///
/// Cheap to clone — it's just an `mpsc::Sender` wrapper. The coordinator
/// holds one of these per lobby.
#[derive(Clone)]
pub struct LobbyHandle {
    lobby_id: LobbyId,
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    /// Returns the lobby's unique id.
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// Sends a join request for a member that still owes a confirmation.
    ///
    /// # Errors
    /// [`LobbyError::Full`] if the lobby filled before this request was
    /// applied — the caller should re-queue the session and retry.
    pub async fn join_unconfirmed(
        &self,
        session: Arc<ClientSession>,
    ) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(LobbyCommand::JoinUnconfirmed {
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?
    }

    /// Sends a join request for a member whose confirmation is taken as
    /// already given, regardless of the lobby's confirmation gating.
    pub async fn join_confirmed(
        &self,
        session: Arc<ClientSession>,
    ) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(LobbyCommand::JoinConfirmed {
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?
    }

    /// Records a member's P2P confirmation (fire-and-forget).
    pub async fn confirm(&self, session: SessionId) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Confirm { session })
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }

    /// Sends a removal request for a member.
    pub async fn remove(&self, session: SessionId) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(LobbyCommand::Remove {
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?
    }

    /// Requests the current lobby info.
    pub async fn get_info(&self) -> Result<LobbyInfo, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(LobbyCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }

    /// Tells the lobby to shut down.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Shutdown)
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }
}

/// The internal lobby actor state. Runs inside a Tokio task.
struct LobbyActor {
    lobby_id: LobbyId,
    config: LobbyConfig,
    status: LobbyStatus,
    /// Members in join order until a match shuffles them.
    members: Vec<Arc<ClientSession>>,
    /// Color id of the previous match in this lobby, for the no-repeat roll.
    last_color: Option<u16>,
    /// Lifetime confirmation count, informational only.
    confirmations: u64,
    /// Set after a match-start broadcast, cleared when membership changes.
    /// In the unconfirmed configuration this is the only thing keeping
    /// the poll loop from re-dispatching every tick; with gating on, a
    /// fresh round of confirmations re-arms the lobby instead.
    dispatched: bool,
    events: mpsc::UnboundedSender<LobbyEvent>,
    receiver: mpsc::Receiver<LobbyCommand>,
    cancel: CancellationToken,
}

impl LobbyActor {
    /// Runs the actor loop: applies commands and polls the fill condition
    /// until shutdown, cancellation, or the lobby drains empty.
    async fn run(mut self) {
        tracing::info!(lobby_id = %self.lobby_id, capacity = self.config.capacity, "lobby started");

        let mut poll = time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(lobby_id = %self.lobby_id, "lobby cancelled");
                    break;
                }
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.apply(cmd).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = poll.tick() => {
                    self.try_start_match().await;
                }
            }
        }

        tracing::info!(lobby_id = %self.lobby_id, "lobby stopped");
    }

    /// Applies one command. Returns `true` when the actor should stop.
    async fn apply(&mut self, cmd: LobbyCommand) -> bool {
        match cmd {
            LobbyCommand::JoinUnconfirmed { session, reply } => {
                let (result, drained) = self.apply_join(session, false).await;
                let _ = reply.send(result);
                drained
            }
            LobbyCommand::JoinConfirmed { session, reply } => {
                let (result, drained) = self.apply_join(session, true).await;
                let _ = reply.send(result);
                drained
            }
            LobbyCommand::Confirm { session } => {
                self.handle_confirm(session);
                false
            }
            LobbyCommand::Remove { session, reply } => {
                match self.handle_remove(session) {
                    Ok(drained) => {
                        let _ = reply.send(Ok(()));
                        drained
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        false
                    }
                }
            }
            LobbyCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
                false
            }
            LobbyCommand::Shutdown => {
                tracing::info!(lobby_id = %self.lobby_id, "lobby shutting down");
                true
            }
        }
    }

    /// Runs a join and then re-checks the session's liveness: a session
    /// that retired while the join's settle delays were in flight has
    /// already passed its disconnect cleanup (which saw no lobby yet),
    /// so it is undone here as a normal removal — otherwise it would sit
    /// as a ghost member that can never confirm and wedge the quorum.
    ///
    /// Returns the join result and whether the undo drained the lobby.
    async fn apply_join(
        &mut self,
        session: Arc<ClientSession>,
        pre_confirmed: bool,
    ) -> (Result<(), LobbyError>, bool) {
        let id = session.id();
        let result = self.handle_join(Arc::clone(&session), pre_confirmed).await;
        if result.is_ok() && !session.is_alive() {
            let drained = matches!(self.handle_remove(id), Ok(true));
            return (Err(LobbyError::Retired(id)), drained);
        }
        (result, false)
    }

    /// Adds a member, notifying it and the incumbents.
    ///
    /// The first member gets a "lobby created" frame; later joiners get
    /// "lobby joined" plus, after a settle delay, the roster of everyone
    /// already present. Each incumbent gets a paced "peer joined" frame
    /// carrying the newcomer's endpoint.
    async fn handle_join(
        &mut self,
        session: Arc<ClientSession>,
        pre_confirmed: bool,
    ) -> Result<(), LobbyError> {
        if !session.is_alive() {
            return Err(LobbyError::Retired(session.id()));
        }
        if self.members.len() >= self.config.capacity {
            return Err(LobbyError::Full(self.lobby_id));
        }

        let client_number = self.members.len() as u16 + 1;
        session.enter_lobby(self.lobby_id, client_number);
        if pre_confirmed || !self.config.require_confirmation {
            session.mark_confirmed();
        }

        if client_number == 1 {
            // The founder has no peers to negotiate with yet.
            session.mark_confirmed();
            let _ = session.enqueue(build::lobby_created(self.lobby_id)?);
        } else {
            let _ = session.enqueue(build::lobby_joined(self.lobby_id)?);

            for member in &self.members {
                time::sleep(self.config.join_pacing).await;
                let _ = member
                    .enqueue(build::peer_joined(session.address(), session.udp_port())?);
            }

            time::sleep(self.config.roster_settle).await;
            let roster: Vec<(String, u16)> = self
                .members
                .iter()
                .map(|m| (m.address().to_string(), m.udp_port()))
                .collect();
            let _ = session.enqueue(build::roster(&roster)?);
        }

        self.members.push(session);
        self.dispatched = false;
        tracing::info!(
            lobby_id = %self.lobby_id,
            members = self.members.len(),
            "member joined"
        );

        Ok(())
    }

    /// Records a member's confirmation. Unknown sessions are ignored —
    /// the member may have disconnected while the command was in flight.
    fn handle_confirm(&mut self, session: SessionId) {
        match self.members.iter().find(|m| m.id() == session) {
            Some(member) => {
                member.mark_confirmed();
                self.confirmations += 1;
                tracing::info!(
                    lobby_id = %self.lobby_id,
                    %session,
                    confirmations = self.confirmations,
                    "peer confirmed"
                );
            }
            None => {
                tracing::debug!(
                    lobby_id = %self.lobby_id,
                    %session,
                    "confirmation from non-member, ignoring"
                );
            }
        }
    }

    /// Removes a member and tells the survivors which endpoint left.
    /// Returns `Ok(true)` when the lobby drained empty and the actor
    /// should stop.
    fn handle_remove(&mut self, session: SessionId) -> Result<bool, LobbyError> {
        let Some(pos) = self.members.iter().position(|m| m.id() == session) else {
            return Err(LobbyError::NotMember(session, self.lobby_id));
        };

        let was_full = self.members.len() == self.config.capacity;
        let departing = self.members.remove(pos);
        let frame = build::peer_left(departing.address(), departing.udp_port())?;
        departing.leave_lobby();
        self.dispatched = false;

        for member in &self.members {
            let _ = member.enqueue(frame.clone());
        }

        tracing::info!(
            lobby_id = %self.lobby_id,
            %session,
            members = self.members.len(),
            "member left"
        );

        if self.members.is_empty() {
            let _ = self.events.send(LobbyEvent::Empty(self.lobby_id));
            return Ok(true);
        }
        if was_full {
            let _ = self.events.send(LobbyEvent::Reaccepting(self.lobby_id));
        }
        Ok(false)
    }

    /// Polled between commands: dispatches a match once the lobby is at
    /// capacity and (when gating is on) every member has confirmed.
    async fn try_start_match(&mut self) {
        if !self.status.is_waiting() || self.members.len() != self.config.capacity {
            return;
        }
        if self.config.require_confirmation {
            if !self.members.iter().all(|m| m.is_confirmed()) {
                return;
            }
        } else if self.dispatched {
            return;
        }

        // Give the last confirmation's ack a head start on the wire.
        time::sleep(self.config.ready_settle).await;

        self.status = LobbyStatus::Ready;
        let _ = self.events.send(LobbyEvent::Filled(self.lobby_id));

        if let Err(e) = self.start_match() {
            tracing::warn!(lobby_id = %self.lobby_id, error = %e, "match start failed");
        }
        self.dispatched = true;
        self.status = LobbyStatus::Waiting;
    }

    /// Rolls the match parameters, assigns teams, and broadcasts the
    /// match-start frame to every member.
    fn start_match(&mut self) -> Result<(), LobbyError> {
        let mut rng = rand::rng();

        let color = teams::roll_color(&self.config.color_ids, self.last_color, &mut rng);
        let music = teams::roll_music(&self.config.music_ids, &mut rng);

        // Shuffle before splitting so the balanced walk doubles as a
        // random draw of who lands on which team.
        self.members.shuffle(&mut rng);
        let assignments = teams::balanced_split(self.members.len(), &mut rng);

        let mut entries = Vec::with_capacity(self.members.len());
        for (member, (team, position)) in self.members.iter().zip(&assignments) {
            member.assign_team(*team, *position);
            entries.push(MatchStartEntry {
                address: member.address().to_string(),
                udp_port: member.udp_port(),
                team: *team,
                position: *position,
            });
        }

        let frame = build::match_start(color, music, &entries)?;
        for member in &self.members {
            let _ = member.enqueue(frame.clone());
            member.clear_confirmed();
        }

        self.last_color = Some(color);
        tracing::info!(
            lobby_id = %self.lobby_id,
            members = self.members.len(),
            color,
            music,
            "match started"
        );

        Ok(())
    }

    fn info(&self) -> LobbyInfo {
        LobbyInfo {
            lobby_id: self.lobby_id,
            status: self.status,
            member_count: self.members.len(),
            capacity: self.config.capacity,
            confirmations: self.confirmations,
        }
    }
}

/// Spawns a new lobby actor task and returns a handle to communicate
/// with it.
///
/// `events` receives the lobby's lifecycle callbacks; `cancel` stops the
/// actor without draining it (server shutdown).
pub fn spawn_lobby(
    lobby_id: LobbyId,
    config: LobbyConfig,
    events: mpsc::UnboundedSender<LobbyEvent>,
    cancel: CancellationToken,
) -> LobbyHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

    let actor = LobbyActor {
        lobby_id,
        config,
        status: LobbyStatus::Waiting,
        members: Vec::new(),
        last_color: None,
        confirmations: 0,
        dispatched: false,
        events,
        receiver: rx,
        cancel,
    };

    tokio::spawn(actor.run());

    LobbyHandle {
        lobby_id,
        sender: tx,
    }
}
