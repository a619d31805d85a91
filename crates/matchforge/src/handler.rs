//! Per-connection handling: the read loop, the write loop, and disconnect.
//!
//! Each accepted connection gets two Tokio tasks. The read task owns the
//! socket's read half and dispatches one fixed-size frame at a time; the
//! write task owns the write half and drains the session's outbound FIFO,
//! so enqueue order is wire order. Either task ending for any reason
//! funnels into [`disconnect`], which is idempotent.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use matchforge_session::ClientSession;
use matchforge_wire::{FRAME_LEN, PacketBuffer, build, opcode};

use crate::MatchforgeError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
///
/// Registers the session, starts the write task, greets the client with
/// the handshake-start frame, then runs the read loop until the peer
/// hangs up, asks to disconnect, or the session is cancelled.
pub(crate) async fn run_connection(
    stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), MatchforgeError> {
    let peer = stream.peer_addr()?;
    let (read_half, write_half) = stream.into_split();

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancel = state.cancel.child_token();
    let session = Arc::new(ClientSession::new(
        peer.ip().to_string(),
        peer.port(),
        outbound_tx,
        cancel,
    ));

    let clients = {
        let mut registries = state.registries.lock().expect("registry lock");
        registries.insert_session(Arc::clone(&session));
        registries.session_count()
    };
    tracing::info!(session_id = %session.id(), %peer, clients, "client connected");

    tokio::spawn(write_loop(
        write_half,
        outbound_rx,
        Arc::clone(&session),
        Arc::clone(&state),
    ));

    let result = read_loop(read_half, &session, &state).await;
    disconnect(&state, &session).await;
    result
}

/// Greets the client with the handshake-start frame, then reads one
/// padded frame at a time and dispatches on its opcode.
async fn read_loop(
    mut read_half: OwnedReadHalf,
    session: &Arc<ClientSession>,
    state: &Arc<ServerState>,
) -> Result<(), MatchforgeError> {
    session.enqueue(build::handshake_start()?)?;

    let mut frame = [0u8; FRAME_LEN];

    loop {
        tokio::select! {
            _ = session.cancel_token().cancelled() => return Ok(()),
            read = read_half.read_exact(&mut frame) => {
                if let Err(e) = read {
                    tracing::debug!(session_id = %session.id(), error = %e, "read ended");
                    return Ok(());
                }
            }
        }

        let mut buf = PacketBuffer::from_frame(&frame)?;
        let op = buf.read_u16()?;

        match op {
            opcode::HANDSHAKE_ACK => {
                // Tell the client what endpoint we see it as; it echoes
                // this string in its UDP discovery datagram.
                session.enqueue(build::identity(session.address(), session.tcp_port())?)?;
            }

            opcode::SEARCH_REQUEST => {
                session.begin_search();
                {
                    let mut registries = state.registries.lock().expect("registry lock");
                    registries.enqueue_search(session.id());
                }
                session.enqueue(build::search_accepted()?)?;
                tracing::info!(session_id = %session.id(), "searching for a match");
            }

            opcode::PEER_CONFIRMED => {
                let lobby = {
                    let registries = state.registries.lock().expect("registry lock");
                    session.lobby().and_then(|id| registries.lobby(id))
                };
                match lobby {
                    Some(handle) => {
                        if let Err(e) = handle.confirm(session.id()).await {
                            tracing::debug!(
                                session_id = %session.id(),
                                error = %e,
                                "confirmation lost, lobby gone"
                            );
                        }
                    }
                    None => {
                        tracing::debug!(
                            session_id = %session.id(),
                            "confirmation outside a lobby"
                        );
                    }
                }
                // Acked even without a lobby, so a client whose lobby was
                // torn down mid-confirmation isn't left waiting.
                session.enqueue(build::confirm_ack()?)?;
            }

            opcode::CLIENT_DISCONNECT => {
                tracing::info!(session_id = %session.id(), "client requested disconnect");
                return Ok(());
            }

            opcode::PING => {
                tracing::trace!(session_id = %session.id(), "heartbeat echo");
            }

            other => {
                tracing::debug!(session_id = %session.id(), opcode = other, "unknown opcode, ignoring");
            }
        }
    }
}

/// Drains the session's outbound FIFO onto the socket, one full padded
/// frame per message. A write failure tears the connection down.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<PacketBuffer>,
    session: Arc<ClientSession>,
    state: Arc<ServerState>,
) {
    loop {
        let frame = tokio::select! {
            _ = session.cancel_token().cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if let Err(e) = write_half.write_all(frame.as_bytes()).await {
            tracing::debug!(session_id = %session.id(), error = %e, "write failed");
            break;
        }
    }

    disconnect(&state, &session).await;
}

/// Tears a session down. Idempotent: the first caller wins the retire
/// latch and performs the cleanup; later callers return immediately.
///
/// Cleanup order matters: cancel both connection loops, unregister, then
/// tell the lobby — which broadcasts the single opcode-14 departure frame
/// to the survivors.
pub(crate) async fn disconnect(state: &Arc<ServerState>, session: &Arc<ClientSession>) {
    if !session.retire() {
        return;
    }
    session.cancel_token().cancel();

    let (lobby, clients) = {
        let mut registries = state.registries.lock().expect("registry lock");
        registries.remove_session(session.id());
        registries.remove_searcher(session.id());
        let lobby = session.lobby().and_then(|id| registries.lobby(id));
        (lobby, registries.session_count())
    };

    if let Some(handle) = lobby {
        if let Err(e) = handle.remove(session.id()).await {
            tracing::debug!(
                session_id = %session.id(),
                error = %e,
                "lobby removal raced a teardown"
            );
        }
    }

    tracing::info!(session_id = %session.id(), clients, "client disconnected");
}
