//! Builders for every server→client message.
//!
//! Each opcode's field order is defined exactly once, here. Callers get a
//! ready-to-send [`PacketBuffer`] and never touch field layout themselves.

use serde::{Deserialize, Serialize};

use crate::{LobbyId, PacketBuffer, WireError, opcode};

/// One member's slot in the match-start roster (opcode 15).
///
/// Serialized as a JSON array element inside the length-prefixed string
/// payload, so the client can hand the whole roster to its JSON parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStartEntry {
    /// Member's remote address.
    pub address: String,
    /// Member's discovered UDP port (0 if discovery never completed).
    pub udp_port: u16,
    /// Assigned team, 1 or 2.
    pub team: u16,
    /// 0-based slot within the team.
    pub position: u16,
}

/// Message builder functions, one per server→client opcode.
pub mod build {
    use super::*;

    fn opcode_only(op: u16) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(op)?;
        Ok(buf)
    }

    /// Opcode 254 — handshake start, sent immediately after accept.
    pub fn handshake_start() -> Result<PacketBuffer, WireError> {
        opcode_only(opcode::HANDSHAKE_START)
    }

    /// Opcode 253 — the client's observed address and TCP port.
    pub fn identity(address: &str, tcp_port: u16) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(opcode::IDENTITY)?;
        buf.write_str(address)?;
        buf.write_str(&tcp_port.to_string())?;
        Ok(buf)
    }

    /// Opcode 4 — matchmaking request accepted.
    pub fn search_accepted() -> Result<PacketBuffer, WireError> {
        opcode_only(opcode::SEARCH_ACCEPTED)
    }

    /// Opcode 6 — the recipient started a brand-new lobby.
    pub fn lobby_created(lobby_id: LobbyId) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(opcode::LOBBY_CREATED)?;
        buf.write_u16(lobby_id.0)?;
        Ok(buf)
    }

    /// Opcode 7 — the recipient joined an already-populated lobby.
    pub fn lobby_joined(lobby_id: LobbyId) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(opcode::LOBBY_JOINED)?;
        buf.write_u16(lobby_id.0)?;
        Ok(buf)
    }

    /// Opcode 11 — broadcast to incumbents: a member joined.
    pub fn peer_joined(address: &str, udp_port: u16) -> Result<PacketBuffer, WireError> {
        peer_endpoint(opcode::PEER_JOINED, address, udp_port)
    }

    /// Opcode 14 — broadcast to remaining members: a member left.
    pub fn peer_left(address: &str, udp_port: u16) -> Result<PacketBuffer, WireError> {
        peer_endpoint(opcode::PEER_LEFT, address, udp_port)
    }

    fn peer_endpoint(op: u16, address: &str, udp_port: u16) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(op)?;
        buf.write_str(address)?;
        buf.write_str(&udp_port.to_string())?;
        Ok(buf)
    }

    /// Opcode 9 — the full roster, sent once to a new joiner.
    ///
    /// `members` is (address, udp_port) for every incumbent.
    pub fn roster(members: &[(String, u16)]) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(opcode::ROSTER)?;
        buf.write_u16(members.len() as u16)?;
        for (address, udp_port) in members {
            buf.write_str(address)?;
            buf.write_str(&udp_port.to_string())?;
        }
        Ok(buf)
    }

    /// Opcode 13 — confirmation acknowledged.
    pub fn confirm_ack() -> Result<PacketBuffer, WireError> {
        opcode_only(opcode::CONFIRM_ACK)
    }

    /// Opcode 15 — match start: color id, music id, and the JSON roster.
    pub fn match_start(
        color: u16,
        music: u16,
        entries: &[MatchStartEntry],
    ) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(opcode::MATCH_START)?;
        buf.write_u16(color)?;
        buf.write_u16(music)?;
        buf.write_str(&serde_json::to_string(entries)?)?;
        Ok(buf)
    }

    /// Opcode 0 — heartbeat ping.
    pub fn ping() -> Result<PacketBuffer, WireError> {
        opcode_only(opcode::PING)
    }

    /// Opcode 252 — UDP discovery acknowledged, echoing the datagram text.
    pub fn discovery_ack(echo: &str) -> Result<PacketBuffer, WireError> {
        let mut buf = PacketBuffer::new();
        buf.seek(0);
        buf.write_u16(opcode::DISCOVERY_ACK)?;
        buf.write_str(echo)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(mut buf: PacketBuffer) -> PacketBuffer {
        buf.seek(0);
        buf
    }

    #[test]
    fn test_handshake_start_is_opcode_only() {
        let mut buf = decode(build::handshake_start().unwrap());
        assert_eq!(buf.read_u16().unwrap(), opcode::HANDSHAKE_START);
    }

    #[test]
    fn test_identity_carries_address_and_port_strings() {
        let mut buf = decode(build::identity("10.0.0.7", 52110).unwrap());
        assert_eq!(buf.read_u16().unwrap(), opcode::IDENTITY);
        assert_eq!(buf.read_str().unwrap(), "10.0.0.7");
        assert_eq!(buf.read_str().unwrap(), "52110");
    }

    #[test]
    fn test_lobby_created_and_joined_carry_lobby_id() {
        let mut created = decode(build::lobby_created(LobbyId(731)).unwrap());
        assert_eq!(created.read_u16().unwrap(), opcode::LOBBY_CREATED);
        assert_eq!(created.read_u16().unwrap(), 731);

        let mut joined = decode(build::lobby_joined(LobbyId(731)).unwrap());
        assert_eq!(joined.read_u16().unwrap(), opcode::LOBBY_JOINED);
        assert_eq!(joined.read_u16().unwrap(), 731);
    }

    #[test]
    fn test_roster_lists_count_then_each_member() {
        let members = vec![
            ("10.0.0.1".to_string(), 40001),
            ("10.0.0.2".to_string(), 40002),
        ];
        let mut buf = decode(build::roster(&members).unwrap());
        assert_eq!(buf.read_u16().unwrap(), opcode::ROSTER);
        assert_eq!(buf.read_u16().unwrap(), 2);
        assert_eq!(buf.read_str().unwrap(), "10.0.0.1");
        assert_eq!(buf.read_str().unwrap(), "40001");
        assert_eq!(buf.read_str().unwrap(), "10.0.0.2");
        assert_eq!(buf.read_str().unwrap(), "40002");
    }

    #[test]
    fn test_match_start_roster_parses_back_as_json() {
        let entries = vec![
            MatchStartEntry {
                address: "10.0.0.1".into(),
                udp_port: 40001,
                team: 1,
                position: 0,
            },
            MatchStartEntry {
                address: "10.0.0.2".into(),
                udp_port: 40002,
                team: 2,
                position: 0,
            },
        ];
        let mut buf = decode(build::match_start(3, 1, &entries).unwrap());

        assert_eq!(buf.read_u16().unwrap(), opcode::MATCH_START);
        assert_eq!(buf.read_u16().unwrap(), 3);
        assert_eq!(buf.read_u16().unwrap(), 1);
        let json = buf.read_str().unwrap();
        let parsed: Vec<MatchStartEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_peer_left_mirrors_peer_joined_layout() {
        let mut joined = decode(build::peer_joined("10.0.0.9", 999).unwrap());
        let mut left = decode(build::peer_left("10.0.0.9", 999).unwrap());

        assert_eq!(joined.read_u16().unwrap(), opcode::PEER_JOINED);
        assert_eq!(left.read_u16().unwrap(), opcode::PEER_LEFT);
        assert_eq!(joined.read_str().unwrap(), left.read_str().unwrap());
        assert_eq!(joined.read_str().unwrap(), left.read_str().unwrap());
    }

    #[test]
    fn test_discovery_ack_echoes_datagram_text() {
        let mut buf = decode(build::discovery_ack("10.0.0.7:52110").unwrap());
        assert_eq!(buf.read_u16().unwrap(), opcode::DISCOVERY_ACK);
        assert_eq!(buf.read_str().unwrap(), "10.0.0.7:52110");
    }
}
