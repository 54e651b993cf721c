//! Opaque identifiers for players and lobbies.
//!
//! Both are UUID-v4 values wrapped in newtypes, so a `LobbyId` can never be
//! passed where a `PlayerId` is expected. On the wire they are plain
//! hyphenated strings (`#[serde(transparent)]`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

/// A unique identifier for a player.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Allocates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a client-supplied identifier.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        parse_uuid(value, "player").map(Self)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A unique identifier for a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyId(Uuid);

impl LobbyId {
    /// Allocates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a client-supplied identifier.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        parse_uuid(value, "lobby").map(Self)
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for LobbyId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_uuid(value: &str, kind: &'static str) -> Result<Uuid, ProtocolError> {
    Uuid::parse_str(value).map_err(|_| ProtocolError::InvalidId {
        kind,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_player_ids_are_distinct() {
        assert_ne!(PlayerId::generate(), PlayerId::generate());
    }

    #[test]
    fn test_player_id_display_is_hyphenated_lowercase() {
        let id = PlayerId::parse("6F9619FF-8B86-D011-B42D-00C04FC964FF")
            .unwrap();
        assert_eq!(id.to_string(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
    }

    #[test]
    fn test_player_id_parse_rejects_garbage() {
        let err = PlayerId::parse("player-one").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidId { kind: "player", .. }
        ));
    }

    #[test]
    fn test_lobby_id_parse_round_trips_display() {
        let id = LobbyId::generate();
        let parsed: LobbyId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = PlayerId::generate();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }

    #[test]
    fn test_player_id_order_matches_string_order() {
        let mut ids: Vec<PlayerId> =
            (0..16).map(|_| PlayerId::generate()).collect();
        ids.sort();
        let strings: Vec<String> = ids.iter().map(|p| p.to_string()).collect();
        let mut sorted = strings.clone();
        sorted.sort();
        assert_eq!(strings, sorted);
    }
}
