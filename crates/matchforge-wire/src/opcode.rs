//! The opcode catalog: 16-bit message-type discriminators.
//!
//! Every message begins with one of these. Client→server opcodes are
//! handled by the connection read loop; server→client opcodes are built
//! by [`crate::build`].

/// Server→client: heartbeat ping, no payload.
pub const PING: u16 = 0;

/// Client→server: request matchmaking, no payload.
pub const SEARCH_REQUEST: u16 = 3;

/// Server→client: matchmaking request accepted, no payload.
pub const SEARCH_ACCEPTED: u16 = 4;

/// Server→client: you created a new lobby. Payload: lobby id.
pub const LOBBY_CREATED: u16 = 6;

/// Server→client: you joined an existing lobby. Payload: lobby id.
pub const LOBBY_JOINED: u16 = 7;

/// Client→server: client-requested disconnect, no payload.
pub const CLIENT_DISCONNECT: u16 = 8;

/// Server→client: full roster for a new joiner.
/// Payload: member count, then each member's address + UDP port.
pub const ROSTER: u16 = 9;

/// Server→client: a member joined. Payload: joiner's address + UDP port.
pub const PEER_JOINED: u16 = 11;

/// Client→server: P2P negotiation with all peers complete, no payload.
pub const PEER_CONFIRMED: u16 = 12;

/// Server→client: confirmation acknowledged, no payload.
pub const CONFIRM_ACK: u16 = 13;

/// Server→client: a member left. Payload: departer's address + UDP port.
pub const PEER_LEFT: u16 = 14;

/// Server→client: match start / team assignment.
/// Payload: color id, music id, JSON roster string.
pub const MATCH_START: u16 = 15;

/// Server→client: UDP discovery acknowledged. Payload: echoed string.
pub const DISCOVERY_ACK: u16 = 252;

/// Server→client: your observed identity. Payload: address, TCP port.
pub const IDENTITY: u16 = 253;

/// Server→client: handshake start, no payload.
pub const HANDSHAKE_START: u16 = 254;

/// Client→server: handshake acknowledged, no payload.
pub const HANDSHAKE_ACK: u16 = 255;
