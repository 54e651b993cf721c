//! Lobby queue sizing and lifecycle phase.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Queue capacities for every lobby spawned by a server.
///
/// Both queues are bounded: a full queue makes the sender wait rather than
/// dropping the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Capacity of the inbound request queue drained by the lobby actor.
    pub inbound_capacity: usize,

    /// Capacity of the game fan-out queue, created when a game starts.
    pub fanout_capacity: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 64,
            fanout_capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyPhase
// ---------------------------------------------------------------------------

/// Where a lobby is in its lifecycle.
///
/// ```text
/// Open → InGame → Closed
///   └──────────────↗
/// ```
///
/// `Closed` is terminal. A lobby can close from either earlier phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyPhase {
    Open,
    InGame,
    Closed,
}

impl LobbyPhase {
    /// Returns `true` if a game can be started from this phase.
    pub fn can_start_game(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for LobbyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::InGame => write!(f, "InGame"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.inbound_capacity, 64);
        assert_eq!(config.fanout_capacity, 64);
    }

    #[test]
    fn test_lobby_config_fills_missing_fields() {
        let config: LobbyConfig =
            serde_json::from_str(r#"{ "inbound_capacity": 8 }"#).unwrap();
        assert_eq!(config.inbound_capacity, 8);
        assert_eq!(config.fanout_capacity, 64);
    }

    #[test]
    fn test_only_open_lobbies_start_games() {
        assert!(LobbyPhase::Open.can_start_game());
        assert!(!LobbyPhase::InGame.can_start_game());
        assert!(!LobbyPhase::Closed.can_start_game());
    }

    #[test]
    fn test_lobby_phase_display() {
        assert_eq!(LobbyPhase::InGame.to_string(), "InGame");
    }
}
