//! The coordinator's registries: sessions, lobbies, and the search queue.
//!
//! All structural mutation goes through one `Registries` value behind a
//! single `std::sync::Mutex`. Critical sections stay short — callers take
//! a snapshot or a clone and do their I/O after releasing the lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rand::Rng;

use matchforge_lobby::LobbyHandle;
use matchforge_session::ClientSession;
use matchforge_wire::{LobbyId, SessionId};

/// Fresh lobby ids are rolled in this range and re-rolled on collision.
const LOBBY_ID_RANGE: std::ops::Range<u16> = 0..1000;

#[derive(Default)]
pub(crate) struct Registries {
    /// Every connected session, by id.
    sessions: HashMap<SessionId, Arc<ClientSession>>,
    /// Every live lobby, by id.
    lobbies: HashMap<LobbyId, LobbyHandle>,
    /// Lobbies with free slots, oldest first — the matchmaker fills
    /// these before creating new ones.
    waiting: Vec<LobbyId>,
    /// Sessions queued for matchmaking, FIFO.
    searching: VecDeque<SessionId>,
}

impl Registries {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // -- sessions ------------------------------------------------------------

    pub(crate) fn insert_session(&mut self, session: Arc<ClientSession>) {
        self.sessions.insert(session.id(), session);
    }

    pub(crate) fn remove_session(&mut self, id: SessionId) -> Option<Arc<ClientSession>> {
        self.sessions.remove(&id)
    }

    pub(crate) fn session(&self, id: SessionId) -> Option<Arc<ClientSession>> {
        self.sessions.get(&id).cloned()
    }

    /// Finds the session whose identity string matches a UDP discovery
    /// datagram's payload.
    pub(crate) fn session_by_identity(&self, identity: &str) -> Option<Arc<ClientSession>> {
        self.sessions
            .values()
            .find(|s| s.identity_string() == identity)
            .cloned()
    }

    /// A clone of every session, for broadcasts outside the lock.
    pub(crate) fn session_snapshot(&self) -> Vec<Arc<ClientSession>> {
        self.sessions.values().cloned().collect()
    }

    pub(crate) fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // -- lobbies -------------------------------------------------------------

    /// Rolls an unused lobby id.
    pub(crate) fn fresh_lobby_id<R: Rng>(&self, rng: &mut R) -> LobbyId {
        loop {
            let id = LobbyId(rng.random_range(LOBBY_ID_RANGE));
            if !self.lobbies.contains_key(&id) {
                return id;
            }
        }
    }

    /// Registers a new lobby; it starts out waiting for members.
    pub(crate) fn insert_lobby(&mut self, handle: LobbyHandle) {
        let id = handle.lobby_id();
        self.lobbies.insert(id, handle);
        self.waiting.push(id);
    }

    pub(crate) fn lobby(&self, id: LobbyId) -> Option<LobbyHandle> {
        self.lobbies.get(&id).cloned()
    }

    pub(crate) fn remove_lobby(&mut self, id: LobbyId) {
        self.lobbies.remove(&id);
        self.waiting.retain(|w| *w != id);
    }

    /// The oldest lobby still accepting members, if any.
    pub(crate) fn first_waiting(&self) -> Option<LobbyHandle> {
        self.waiting.first().and_then(|id| self.lobbies.get(id)).cloned()
    }

    /// Takes a filled lobby off the waiting list.
    pub(crate) fn mark_filled(&mut self, id: LobbyId) {
        self.waiting.retain(|w| *w != id);
    }

    /// Puts a lobby with freed slots back on the waiting list.
    pub(crate) fn mark_reaccepting(&mut self, id: LobbyId) {
        if self.lobbies.contains_key(&id) && !self.waiting.contains(&id) {
            self.waiting.push(id);
        }
    }

    // -- search queue ----------------------------------------------------------

    pub(crate) fn enqueue_search(&mut self, id: SessionId) {
        if !self.searching.contains(&id) {
            self.searching.push_back(id);
        }
    }

    /// Puts a session back at the head of the queue after a join lost
    /// the race against a filling lobby.
    pub(crate) fn requeue_search_front(&mut self, id: SessionId) {
        if !self.searching.contains(&id) {
            self.searching.push_front(id);
        }
    }

    pub(crate) fn next_searcher(&mut self) -> Option<SessionId> {
        self.searching.pop_front()
    }

    pub(crate) fn remove_searcher(&mut self, id: SessionId) {
        self.searching.retain(|s| *s != id);
    }

    // -- shutdown ----------------------------------------------------------------

    /// Empties every registry, returning the sessions so the caller can
    /// retire them.
    pub(crate) fn drain(&mut self) -> Vec<Arc<ClientSession>> {
        self.lobbies.clear();
        self.waiting.clear();
        self.searching.clear();
        self.sessions.drain().map(|(_, s)| s).collect()
    }
}
