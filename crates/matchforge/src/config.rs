//! Server configuration.

use std::time::Duration;

use matchforge_lobby::LobbyConfig;

/// Configuration for a Matchforge server.
///
/// The intervals here drive the coordinator's background loops; the
/// nested [`LobbyConfig`] is handed to every lobby the matchmaker spawns.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Address the TCP listener and UDP discovery socket bind to.
    /// Both share the same port.
    pub bind_addr: String,

    /// How often the matchmaking loop moves a searcher into a lobby.
    pub matchmaking_interval: Duration,

    /// How often the heartbeat loop pings every connected client.
    pub heartbeat_interval: Duration,

    /// Configuration applied to every lobby.
    pub lobby: LobbyConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6510".to_string(),
            matchmaking_interval: Duration::from_millis(10),
            heartbeat_interval: Duration::from_secs(6),
            lobby: LobbyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = MatchConfig::default();
        assert_eq!(config.matchmaking_interval, Duration::from_millis(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(6));
        assert_eq!(config.lobby.capacity, 2);
    }
}
