//! `MatchServer` builder, shared state, and the coordinator loops.
//!
//! This is the entry point for running a Matchforge server. It ties the
//! layers together: wire → session → lobby, plus the four background
//! loops (accept, UDP discovery, matchmaking, heartbeat) and the lobby
//! event pump.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use matchforge_lobby::{LobbyError, LobbyEvent, spawn_lobby};
use matchforge_wire::{PacketBuffer, build};

use crate::MatchforgeError;
use crate::config::MatchConfig;
use crate::handler::run_connection;
use crate::registry::Registries;

/// Largest UDP discovery datagram we accept. The payload is an
/// `"address:tcp_port"` identity string, so this is generous.
const DISCOVERY_DATAGRAM_MAX: usize = 256;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registries sit behind one mutex; critical sections never span an
/// `.await`.
pub(crate) struct ServerState {
    pub(crate) config: MatchConfig,
    pub(crate) registries: Mutex<Registries>,
    pub(crate) cancel: CancellationToken,
    pub(crate) lobby_events: mpsc::UnboundedSender<LobbyEvent>,
}

impl ServerState {
    /// Enqueues a copy of `frame` to every connected session. Returns
    /// how many queues accepted it.
    pub(crate) fn send_to_all(&self, frame: &PacketBuffer) -> usize {
        let sessions = self
            .registries
            .lock()
            .expect("registry lock")
            .session_snapshot();

        let mut sent = 0;
        for session in sessions {
            if session.enqueue(frame.clone()).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Stops the server: cancels every loop (connections and lobby
    /// actors hold child tokens), retires every session, and empties
    /// the registries. Idempotent.
    pub(crate) fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        let sessions = self.registries.lock().expect("registry lock").drain();
        for session in &sessions {
            session.retire();
        }
        tracing::info!(clients = sessions.len(), "server shut down");
    }
}

/// Builder for configuring and starting a Matchforge server.
///
/// # Example
///
/// ```rust,ignore
/// let server = MatchServer::builder()
///     .bind("0.0.0.0:6510")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct MatchServerBuilder {
    config: MatchConfig,
}

impl MatchServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: MatchConfig::default(),
        }
    }

    /// Sets the address to bind both sockets to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the lobby capacity (members per match).
    pub fn lobby_capacity(mut self, capacity: usize) -> Self {
        self.config.lobby.capacity = capacity;
        self
    }

    /// Sets the lobby configuration wholesale.
    pub fn lobby_config(mut self, lobby: matchforge_lobby::LobbyConfig) -> Self {
        self.config.lobby = lobby;
        self
    }

    /// Sets how often the matchmaking loop runs.
    pub fn matchmaking_interval(mut self, interval: std::time::Duration) -> Self {
        self.config.matchmaking_interval = interval;
        self
    }

    /// Sets how often every client is pinged.
    pub fn heartbeat_interval(mut self, interval: std::time::Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Binds the sockets and returns the server, ready to run.
    pub async fn build(self) -> Result<MatchServer, MatchforgeError> {
        MatchServer::bind(self.config).await
    }
}

impl Default for MatchServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A clonable handle onto a running server, for shutdown and broadcast.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
}

impl ServerHandle {
    /// Stops the server. Idempotent.
    pub fn shutdown(&self) {
        self.state.shutdown();
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.state
            .registries
            .lock()
            .expect("registry lock")
            .session_count()
    }

    /// Enqueues a copy of `frame` to every connected client.
    pub fn send_to_all(&self, frame: &PacketBuffer) -> usize {
        self.state.send_to_all(frame)
    }
}

/// A bound Matchforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MatchServer {
    listener: TcpListener,
    udp: Arc<UdpSocket>,
    state: Arc<ServerState>,
    lobby_events: mpsc::UnboundedReceiver<LobbyEvent>,
}

impl MatchServer {
    /// Creates a new builder.
    pub fn builder() -> MatchServerBuilder {
        MatchServerBuilder::new()
    }

    /// Binds the TCP listener and the UDP discovery socket on the same
    /// port.
    pub async fn bind(config: MatchConfig) -> Result<Self, MatchforgeError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        // Bind UDP to the resolved address so an ephemeral TCP port
        // ("...:0") is mirrored exactly.
        let udp = Arc::new(UdpSocket::bind(listener.local_addr()?).await?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState {
            config,
            registries: Mutex::new(Registries::new()),
            cancel: CancellationToken::new(),
            lobby_events: events_tx,
        });

        Ok(Self {
            listener,
            udp,
            state,
            lobby_events: events_rx,
        })
    }

    /// Returns the local address both sockets are bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a handle for shutting down or broadcasting from outside
    /// the server task.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the server until shut down.
    ///
    /// Spawns the UDP discovery, matchmaking, heartbeat, and lobby event
    /// loops, then accepts connections on this task. Every loop watches
    /// the server's cancellation token.
    pub async fn run(self) -> Result<(), MatchforgeError> {
        let state = Arc::clone(&self.state);
        tracing::info!(addr = %self.local_addr()?, "matchforge server running");

        tokio::spawn(udp_discovery_loop(Arc::clone(&self.udp), Arc::clone(&state)));
        tokio::spawn(matchmaking_loop(Arc::clone(&state)));
        tokio::spawn(heartbeat_loop(Arc::clone(&state)));
        tokio::spawn(lobby_event_loop(self.lobby_events, Arc::clone(&state)));

        loop {
            tokio::select! {
                _ = state.cancel.cancelled() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _peer)) => {
                            let state = Arc::clone(&state);
                            tokio::spawn(async move {
                                if let Err(e) = run_connection(stream, state).await {
                                    tracing::debug!(error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept failed");
                        }
                    }
                }
            }
        }

        state.shutdown();
        Ok(())
    }
}

/// Receives discovery datagrams and binds each one to a session.
///
/// The payload must be the ASCII identity string the client received in
/// its identity frame; the datagram's source port becomes the session's
/// discovered UDP port. Unmatched or malformed datagrams are dropped.
async fn udp_discovery_loop(udp: Arc<UdpSocket>, state: Arc<ServerState>) {
    let mut buf = [0u8; DISCOVERY_DATAGRAM_MAX];

    loop {
        let (len, src) = tokio::select! {
            _ = state.cancel.cancelled() => break,
            received = udp.recv_from(&mut buf) => match received {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "udp recv failed");
                    continue;
                }
            },
        };

        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            tracing::debug!(%src, "non-utf8 discovery datagram, ignoring");
            continue;
        };
        let identity = text.trim_end_matches('\0').trim();
        if identity.is_empty() || !identity.is_ascii() {
            continue;
        }

        let session = {
            let registries = state.registries.lock().expect("registry lock");
            registries.session_by_identity(identity)
        };

        match session {
            Some(session) => {
                session.set_udp_port(src.port());
                match build::discovery_ack(identity) {
                    Ok(frame) => {
                        let _ = session.enqueue(frame);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "discovery ack build failed");
                    }
                }
                tracing::info!(
                    session_id = %session.id(),
                    udp_port = src.port(),
                    "udp endpoint discovered"
                );
            }
            None => {
                tracing::debug!(%src, identity, "discovery datagram matched no session");
            }
        }
    }
}

/// Moves at most one searcher per tick into a waiting lobby, creating a
/// fresh lobby when none has free slots.
async fn matchmaking_loop(state: Arc<ServerState>) {
    let mut poll = time::interval(state.config.matchmaking_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => break,
            _ = poll.tick() => step_matchmaking(&state).await,
        }
    }
}

/// One matchmaking iteration. Registry work happens under the lock;
/// the join itself (which paces frames to lobby members) happens after
/// releasing it.
async fn step_matchmaking(state: &Arc<ServerState>) {
    let (session, waiting) = {
        let mut registries = state.registries.lock().expect("registry lock");
        let Some(id) = registries.next_searcher() else {
            return;
        };
        let Some(session) = registries.session(id) else {
            // Disconnected while queued.
            return;
        };
        (session, registries.first_waiting())
    };

    if !session.is_alive() || !session.is_searching() {
        return;
    }

    let lobby = match waiting {
        Some(handle) => handle,
        None => {
            let mut registries = state.registries.lock().expect("registry lock");
            let id = registries.fresh_lobby_id(&mut rand::rng());
            let handle = spawn_lobby(
                id,
                state.config.lobby.clone(),
                state.lobby_events.clone(),
                state.cancel.child_token(),
            );
            registries.insert_lobby(handle.clone());
            tracing::info!(lobby_id = %id, "lobby created");
            handle
        }
    };

    match lobby.join_unconfirmed(Arc::clone(&session)).await {
        Ok(()) => {}
        Err(LobbyError::Full(_)) | Err(LobbyError::Unavailable(_)) => {
            // Lost the race against a concurrent fill or teardown; the
            // session goes back to the head of the queue for next tick.
            let mut registries = state.registries.lock().expect("registry lock");
            registries.requeue_search_front(session.id());
        }
        Err(LobbyError::Retired(id)) => {
            // Disconnected while the join was in flight; the lobby has
            // already cleaned up and the session stays dequeued.
            tracing::debug!(session_id = %id, "searcher retired mid-join");
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id(), error = %e, "matchmaking join failed");
        }
    }
}

/// Pings every connected client on a fixed interval.
async fn heartbeat_loop(state: Arc<ServerState>) {
    let mut tick = time::interval(state.config.heartbeat_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => break,
            _ = tick.tick() => {
                match build::ping() {
                    Ok(frame) => {
                        let sent = state.send_to_all(&frame);
                        tracing::trace!(clients = sent, "heartbeat");
                    }
                    Err(e) => tracing::warn!(error = %e, "heartbeat build failed"),
                }
            }
        }
    }
}

/// Applies lobby lifecycle events to the registries.
async fn lobby_event_loop(
    mut events: mpsc::UnboundedReceiver<LobbyEvent>,
    state: Arc<ServerState>,
) {
    loop {
        let event = tokio::select! {
            _ = state.cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let mut registries = state.registries.lock().expect("registry lock");
        match event {
            LobbyEvent::Filled(id) => {
                registries.mark_filled(id);
                tracing::info!(lobby_id = %id, "lobby filled");
            }
            LobbyEvent::Reaccepting(id) => {
                registries.mark_reaccepting(id);
                tracing::info!(lobby_id = %id, "lobby reaccepting");
            }
            LobbyEvent::Empty(id) => {
                registries.remove_lobby(id);
                tracing::info!(lobby_id = %id, "lobby removed");
            }
        }
    }
}
