//! Integration tests for the lobby actor.
//!
//! Sessions here are real `ClientSession` records whose outbound queues
//! feed test-held receivers, so every frame the lobby sends can be
//! inspected. Delays are shrunk to keep the suite fast.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use matchforge_lobby::{LobbyConfig, LobbyError, LobbyEvent, LobbyHandle, spawn_lobby};
use matchforge_session::ClientSession;
use matchforge_wire::{LobbyId, MatchStartEntry, PacketBuffer, opcode};

type Events = mpsc::UnboundedReceiver<LobbyEvent>;
type Frames = mpsc::UnboundedReceiver<PacketBuffer>;

fn fast_config() -> LobbyConfig {
    LobbyConfig {
        capacity: 2,
        poll_interval: Duration::from_millis(5),
        join_pacing: Duration::from_millis(1),
        roster_settle: Duration::from_millis(1),
        ready_settle: Duration::from_millis(1),
        require_confirmation: true,
        color_ids: 1..=4,
        music_ids: 1..=2,
    }
}

fn lobby(config: LobbyConfig) -> (LobbyHandle, Events) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let handle = spawn_lobby(LobbyId(7), config, events_tx, CancellationToken::new());
    (handle, events_rx)
}

fn member(address: &str, udp_port: u16) -> (Arc<ClientSession>, Frames) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Arc::new(ClientSession::new(
        address.to_string(),
        50_000,
        tx,
        CancellationToken::new(),
    ));
    session.set_udp_port(udp_port);
    (session, rx)
}

async fn recv_frame(rx: &mut Frames) -> PacketBuffer {
    let mut frame = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("session queue closed");
    frame.seek(0);
    frame
}

async fn recv_event(rx: &mut Events) -> LobbyEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a lobby event")
        .expect("event channel closed")
}

/// Reads frames until one with the wanted opcode arrives.
async fn recv_until(rx: &mut Frames, wanted: u16) -> PacketBuffer {
    loop {
        let mut frame = recv_frame(rx).await;
        if frame.read_u16().unwrap() == wanted {
            frame.seek(0);
            return frame;
        }
    }
}

fn parse_match_start(mut frame: PacketBuffer) -> (u16, u16, Vec<MatchStartEntry>) {
    assert_eq!(frame.read_u16().unwrap(), opcode::MATCH_START);
    let color = frame.read_u16().unwrap();
    let music = frame.read_u16().unwrap();
    let entries = serde_json::from_str(&frame.read_str().unwrap()).unwrap();
    (color, music, entries)
}

#[tokio::test]
async fn test_first_joiner_gets_lobby_created() {
    let (handle, _events) = lobby(fast_config());
    let (m1, mut rx1) = member("10.0.0.1", 40001);

    handle.join_unconfirmed(m1.clone()).await.unwrap();

    let mut frame = recv_frame(&mut rx1).await;
    assert_eq!(frame.read_u16().unwrap(), opcode::LOBBY_CREATED);
    assert_eq!(frame.read_u16().unwrap(), 7);
    assert_eq!(m1.lobby(), Some(LobbyId(7)));
    assert_eq!(m1.client_number(), Some(1));
    assert!(m1.is_confirmed(), "the founder has no peers to negotiate with");
}

#[tokio::test]
async fn test_second_joiner_gets_joined_then_roster() {
    let (handle, _events) = lobby(fast_config());
    let (m1, mut rx1) = member("10.0.0.1", 40001);
    let (m2, mut rx2) = member("10.0.0.2", 40002);

    handle.join_unconfirmed(m1.clone()).await.unwrap();
    handle.join_unconfirmed(m2.clone()).await.unwrap();

    // The joiner hears "lobby joined" first, then the incumbent roster.
    let mut joined = recv_frame(&mut rx2).await;
    assert_eq!(joined.read_u16().unwrap(), opcode::LOBBY_JOINED);
    assert_eq!(joined.read_u16().unwrap(), 7);

    let mut roster = recv_frame(&mut rx2).await;
    assert_eq!(roster.read_u16().unwrap(), opcode::ROSTER);
    assert_eq!(roster.read_u16().unwrap(), 1);
    assert_eq!(roster.read_str().unwrap(), "10.0.0.1");
    assert_eq!(roster.read_str().unwrap(), "40001");

    // The incumbent hears about the newcomer's endpoint.
    let mut peer = recv_until(&mut rx1, opcode::PEER_JOINED).await;
    assert_eq!(peer.read_u16().unwrap(), opcode::PEER_JOINED);
    assert_eq!(peer.read_str().unwrap(), "10.0.0.2");
    assert_eq!(peer.read_str().unwrap(), "40002");

    assert_eq!(m2.client_number(), Some(2));
    assert!(!m2.is_confirmed(), "a later joiner still owes its confirmation");
}

#[tokio::test]
async fn test_join_when_full_is_rejected() {
    let (handle, _events) = lobby(fast_config());
    let (m1, _rx1) = member("10.0.0.1", 40001);
    let (m2, _rx2) = member("10.0.0.2", 40002);
    let (m3, _rx3) = member("10.0.0.3", 40003);

    handle.join_unconfirmed(m1).await.unwrap();
    handle.join_unconfirmed(m2).await.unwrap();

    let result = handle.join_unconfirmed(m3.clone()).await;
    assert!(matches!(result, Err(LobbyError::Full(LobbyId(7)))));
    assert_eq!(m3.lobby(), None, "a rejected session gains no membership");
}

#[tokio::test]
async fn test_match_starts_once_every_member_confirms() {
    let (handle, mut events) = lobby(fast_config());
    let (m1, mut rx1) = member("10.0.0.1", 40001);
    let (m2, mut rx2) = member("10.0.0.2", 40002);

    handle.join_unconfirmed(m1.clone()).await.unwrap();
    handle.join_unconfirmed(m2.clone()).await.unwrap();
    handle.confirm(m2.id()).await.unwrap();

    assert_eq!(recv_event(&mut events).await, LobbyEvent::Filled(LobbyId(7)));

    let (color, music, entries) =
        parse_match_start(recv_until(&mut rx1, opcode::MATCH_START).await);
    let (color2, music2, entries2) =
        parse_match_start(recv_until(&mut rx2, opcode::MATCH_START).await);

    assert_eq!((color, music), (color2, music2));
    assert_eq!(entries, entries2, "every member sees the same roster");
    assert!((1..=4).contains(&color));
    assert!((1..=2).contains(&music));

    let mut teams: Vec<u16> = entries.iter().map(|e| e.team).collect();
    teams.sort_unstable();
    assert_eq!(teams, vec![1, 2], "two members land on opposite teams");
    assert!(entries.iter().all(|e| e.position == 0));

    // Confirmations are spent by the broadcast.
    assert!(!m1.is_confirmed());
    assert!(!m2.is_confirmed());
}

#[tokio::test]
async fn test_match_waits_for_missing_confirmation() {
    let (handle, mut events) = lobby(fast_config());
    let (m1, _rx1) = member("10.0.0.1", 40001);
    let (m2, _rx2) = member("10.0.0.2", 40002);

    handle.join_unconfirmed(m1).await.unwrap();
    handle.join_unconfirmed(m2).await.unwrap();
    // m2 never confirms.

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(
        events.try_recv().is_err(),
        "the lobby must not dispatch before quorum"
    );
}

#[tokio::test]
async fn test_unconfirmed_config_dispatches_exactly_once_per_fill() {
    let config = LobbyConfig {
        require_confirmation: false,
        ..fast_config()
    };
    let (handle, mut events) = lobby(config);
    let (m1, mut rx1) = member("10.0.0.1", 40001);
    let (m2, _rx2) = member("10.0.0.2", 40002);

    handle.join_unconfirmed(m1).await.unwrap();
    handle.join_unconfirmed(m2).await.unwrap();

    assert_eq!(recv_event(&mut events).await, LobbyEvent::Filled(LobbyId(7)));
    recv_until(&mut rx1, opcode::MATCH_START).await;

    // Members stay put; the poll loop must not re-dispatch.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(events.try_recv().is_err(), "only one dispatch per fill cycle");
    assert!(rx1.try_recv().is_err(), "no second match-start frame");
}

#[tokio::test]
async fn test_remove_broadcasts_peer_left_and_reopens_the_lobby() {
    let (handle, mut events) = lobby(fast_config());
    let (m1, mut rx1) = member("10.0.0.1", 40001);
    let (m2, _rx2) = member("10.0.0.2", 40002);

    handle.join_unconfirmed(m1.clone()).await.unwrap();
    handle.join_unconfirmed(m2.clone()).await.unwrap();

    handle.remove(m2.id()).await.unwrap();

    let mut frame = recv_until(&mut rx1, opcode::PEER_LEFT).await;
    assert_eq!(frame.read_u16().unwrap(), opcode::PEER_LEFT);
    assert_eq!(frame.read_str().unwrap(), "10.0.0.2");
    assert_eq!(frame.read_str().unwrap(), "40002");

    assert_eq!(
        recv_event(&mut events).await,
        LobbyEvent::Reaccepting(LobbyId(7)),
        "a slot freed in a previously full lobby"
    );
    assert_eq!(m2.lobby(), None, "the departing session is scrubbed");
}

#[tokio::test]
async fn test_last_removal_empties_the_lobby_and_stops_the_actor() {
    let (handle, mut events) = lobby(fast_config());
    let (m1, _rx1) = member("10.0.0.1", 40001);

    handle.join_unconfirmed(m1.clone()).await.unwrap();
    handle.remove(m1.id()).await.unwrap();

    assert_eq!(recv_event(&mut events).await, LobbyEvent::Empty(LobbyId(7)));

    // The actor is gone; further commands find the channel closed.
    let (m2, _rx2) = member("10.0.0.2", 40002);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let result = handle.join_unconfirmed(m2).await;
    assert!(matches!(result, Err(LobbyError::Unavailable(LobbyId(7)))));
}

#[tokio::test]
async fn test_retired_session_is_rejected_and_lobby_stays_usable() {
    let (handle, mut events) = lobby(fast_config());
    let (m1, _rx1) = member("10.0.0.1", 40001);
    handle.join_unconfirmed(m1.clone()).await.unwrap();

    // m2 disconnected before the matchmaker's join reached the lobby.
    let (m2, rx2) = member("10.0.0.2", 40002);
    drop(rx2);
    m2.retire();

    let result = handle.join_unconfirmed(m2.clone()).await;
    assert!(matches!(result, Err(LobbyError::Retired(id)) if id == m2.id()));
    assert_eq!(handle.get_info().await.unwrap().member_count, 1);

    // A member that can never confirm must not wedge the quorum: a live
    // replacement fills the lobby and the match dispatches.
    let (m3, _rx3) = member("10.0.0.3", 40003);
    handle.join_unconfirmed(m3.clone()).await.unwrap();
    handle.confirm(m3.id()).await.unwrap();
    assert_eq!(recv_event(&mut events).await, LobbyEvent::Filled(LobbyId(7)));
}

#[tokio::test]
async fn test_session_retiring_mid_join_is_undone() {
    // A long roster settle opens a window between the join being accepted
    // and the member list being finalized.
    let config = LobbyConfig {
        roster_settle: Duration::from_millis(50),
        ..fast_config()
    };
    let (handle, _events) = lobby(config);
    let (m1, mut rx1) = member("10.0.0.1", 40001);
    handle.join_unconfirmed(m1.clone()).await.unwrap();

    let (m2, _rx2) = member("10.0.0.2", 40002);
    let join = tokio::spawn({
        let handle = handle.clone();
        let m2 = Arc::clone(&m2);
        async move { handle.join_unconfirmed(m2).await }
    });

    // The disconnect lands while the join is mid-settle, too early for
    // the session to carry a lobby reference the teardown could follow.
    tokio::time::sleep(Duration::from_millis(20)).await;
    m2.retire();

    let result = join.await.unwrap();
    assert!(matches!(result, Err(LobbyError::Retired(id)) if id == m2.id()));
    assert_eq!(m2.lobby(), None, "the undone join leaves no membership");
    assert_eq!(handle.get_info().await.unwrap().member_count, 1);

    // The founder sees the ghost arrive and immediately leave.
    recv_until(&mut rx1, opcode::PEER_JOINED).await;
    recv_until(&mut rx1, opcode::PEER_LEFT).await;
}

#[tokio::test]
async fn test_join_confirmed_skips_the_confirmation_barrier() {
    let (handle, mut events) = lobby(fast_config());
    let (m1, _rx1) = member("10.0.0.1", 40001);
    let (m2, mut rx2) = member("10.0.0.2", 40002);

    handle.join_unconfirmed(m1).await.unwrap();
    // A rejoining member is trusted to still hold its peer connections.
    handle.join_confirmed(m2.clone()).await.unwrap();
    assert!(m2.is_confirmed());

    assert_eq!(recv_event(&mut events).await, LobbyEvent::Filled(LobbyId(7)));
    recv_until(&mut rx2, opcode::MATCH_START).await;
}

#[tokio::test]
async fn test_remove_of_non_member_is_an_error() {
    let (handle, _events) = lobby(fast_config());
    let (m1, _rx1) = member("10.0.0.1", 40001);
    let (stranger, _rx2) = member("10.0.0.9", 40009);

    handle.join_unconfirmed(m1).await.unwrap();

    let result = handle.remove(stranger.id()).await;
    assert!(matches!(
        result,
        Err(LobbyError::NotMember(id, LobbyId(7))) if id == stranger.id()
    ));
}

#[tokio::test]
async fn test_consecutive_matches_never_repeat_color() {
    // Capacity 1 so a single re-confirmation triggers the next match.
    let config = LobbyConfig {
        capacity: 1,
        ..fast_config()
    };
    let (handle, mut events) = lobby(config);
    let (m1, mut rx1) = member("10.0.0.1", 40001);

    handle.join_unconfirmed(m1.clone()).await.unwrap();

    let mut colors = Vec::new();
    for cycle in 0..5 {
        if cycle > 0 {
            handle.confirm(m1.id()).await.unwrap();
        }
        assert_eq!(recv_event(&mut events).await, LobbyEvent::Filled(LobbyId(7)));
        let (color, _, _) = parse_match_start(recv_until(&mut rx1, opcode::MATCH_START).await);
        colors.push(color);
    }

    for pair in colors.windows(2) {
        assert_ne!(pair[0], pair[1], "adjacent matches repeated a color");
    }
}

#[tokio::test]
async fn test_get_info_reflects_membership_and_confirmations() {
    let (handle, _events) = lobby(fast_config());
    let (m1, _rx1) = member("10.0.0.1", 40001);
    let (m2, _rx2) = member("10.0.0.2", 40002);

    let info = handle.get_info().await.unwrap();
    assert_eq!(info.lobby_id, LobbyId(7));
    assert_eq!(info.member_count, 0);
    assert_eq!(info.capacity, 2);

    handle.join_unconfirmed(m1).await.unwrap();
    handle.join_unconfirmed(m2.clone()).await.unwrap();
    handle.confirm(m2.id()).await.unwrap();

    let info = handle.get_info().await.unwrap();
    assert_eq!(info.member_count, 2);
    assert_eq!(info.confirmations, 1);
}

#[tokio::test]
async fn test_cancellation_stops_the_actor() {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = spawn_lobby(LobbyId(3), fast_config(), events_tx, cancel.clone());

    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (m1, _rx1) = member("10.0.0.1", 40001);
    let result = handle.join_unconfirmed(m1).await;
    assert!(matches!(result, Err(LobbyError::Unavailable(LobbyId(3)))));
}
