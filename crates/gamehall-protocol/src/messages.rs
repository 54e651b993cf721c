//! The message catalog exchanged over a lobby connection.
//!
//! Each payload struct maps to exactly one envelope tag through
//! [`Message::TYPE`]. Messages a client may send are additionally collected
//! into the closed [`ClientMessage`] sum type, which is what the server
//! actually matches on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Envelope, Message, ProtocolError};

/// Namespace for messages routed to the active game.
pub const GAME_NAMESPACE: &str = "Game";

macro_rules! message_kind {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Message for $ty {
                const TYPE: &'static str = stringify!($ty);
            }
        )*
    };
}

// ---------------------------------------------------------------------------
// Lobby membership
// ---------------------------------------------------------------------------

/// Client → Server: the handshake. Must be the first message on a new
/// connection.
///
/// The IDs are kept as raw strings so that a malformed ID can be reported
/// as a validation error rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyJoinRequest {
    #[serde(rename = "playerID")]
    pub player_id: String,
    #[serde(rename = "lobbyID")]
    pub lobby_id: String,
}

/// Client → Server: leave the current lobby but keep the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyLeaveRequest {}

/// Reserved tag for "a player was added to the roster".
///
/// Never sent on the wire and never accepted from a client. Inside the
/// server the event is the lobby actor's `Join` request; this type only
/// keeps the tag in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinedEvent {}

/// Reserved tag for "a player was removed from the roster". See
/// [`PlayerJoinedEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeftEvent {}

/// Server → Client: the full roster, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPlayerListBroadcast {
    #[serde(rename = "playerIDs")]
    pub player_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Starting a game
// ---------------------------------------------------------------------------

/// Client → Server: the host asks to start the named game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyStartGameRequest {
    pub game: String,
}

/// Server → Client: outcome of a start request, sent to the requester only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyStartGameResponse {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Server → Client: a game has started in this lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyStartGameBroadcast {
    pub game: String,
}

// ---------------------------------------------------------------------------
// Lobby lifecycle and errors
// ---------------------------------------------------------------------------

/// Server → Client: the lobby has been closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyClosedBroadcast {}

/// Server → Client: the requested lobby isn't registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyDoesNotExistResponse {}

/// Server → Client: generic failure, sent to the offending connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub reason: String,
}

impl ErrorResponse {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

message_kind!(
    LobbyJoinRequest,
    LobbyLeaveRequest,
    PlayerJoinedEvent,
    PlayerLeftEvent,
    LobbyPlayerListBroadcast,
    LobbyStartGameRequest,
    LobbyStartGameResponse,
    LobbyStartGameBroadcast,
    LobbyClosedBroadcast,
    LobbyDoesNotExistResponse,
    ErrorResponse,
);

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Every message a client is allowed to send.
///
/// Decoding checks the tag first, then the payload shape for that tag.
/// `Game/<subtype>` is a passthrough: its contents stay untyped until the
/// active game service decodes them.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    LobbyJoin(LobbyJoinRequest),
    LobbyLeave(LobbyLeaveRequest),
    LobbyStartGame(LobbyStartGameRequest),
    Game { subtype: String, contents: Value },
}

impl ClientMessage {
    /// The wire tag this message was decoded from.
    pub fn kind(&self) -> String {
        match self {
            Self::LobbyJoin(_) => LobbyJoinRequest::TYPE.to_string(),
            Self::LobbyLeave(_) => LobbyLeaveRequest::TYPE.to_string(),
            Self::LobbyStartGame(_) => LobbyStartGameRequest::TYPE.to_string(),
            Self::Game { subtype, .. } => format!("{GAME_NAMESPACE}/{subtype}"),
        }
    }
}

impl TryFrom<Envelope> for ClientMessage {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        match envelope.kind.as_str() {
            LobbyJoinRequest::TYPE => {
                envelope.decode_as().map(Self::LobbyJoin)
            }
            LobbyLeaveRequest::TYPE => {
                envelope.decode_as().map(Self::LobbyLeave)
            }
            LobbyStartGameRequest::TYPE => {
                envelope.decode_as().map(Self::LobbyStartGame)
            }
            kind => match kind.split_once('/') {
                Some((GAME_NAMESPACE, subtype))
                    if !subtype.is_empty() && !subtype.contains('/') =>
                {
                    Ok(Self::Game {
                        subtype: subtype.to_string(),
                        contents: envelope.contents,
                    })
                }
                Some((GAME_NAMESPACE, _)) => {
                    Err(ProtocolError::InvalidGameType(envelope.kind))
                }
                _ if kind == GAME_NAMESPACE => {
                    Err(ProtocolError::InvalidGameType(envelope.kind))
                }
                _ => Err(ProtocolError::UnknownType(envelope.kind)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> Result<ClientMessage, ProtocolError> {
        let envelope: Envelope = serde_json::from_value(value).unwrap();
        ClientMessage::try_from(envelope)
    }

    #[test]
    fn test_join_request_uses_camel_case_ids() {
        let msg = decode(json!({
            "type": "LobbyJoinRequest",
            "contents": { "playerID": "p", "lobbyID": "l" }
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::LobbyJoin(LobbyJoinRequest {
                player_id: "p".into(),
                lobby_id: "l".into(),
            })
        );
    }

    #[test]
    fn test_leave_request_without_contents() {
        let msg = decode(json!({ "type": "LobbyLeaveRequest" })).unwrap();
        assert_eq!(msg, ClientMessage::LobbyLeave(LobbyLeaveRequest {}));
    }

    #[test]
    fn test_start_game_request_decodes() {
        let msg = decode(json!({
            "type": "LobbyStartGameRequest",
            "contents": { "game": "tictactoe" }
        }))
        .unwrap();
        assert_eq!(msg.kind(), "LobbyStartGameRequest");
        assert!(matches!(
            msg,
            ClientMessage::LobbyStartGame(LobbyStartGameRequest { ref game })
                if game == "tictactoe"
        ));
    }

    #[test]
    fn test_start_game_request_missing_field_is_contents_error() {
        let err = decode(json!({
            "type": "LobbyStartGameRequest",
            "contents": {}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidContents {
                kind: "LobbyStartGameRequest",
                ..
            }
        ));
    }

    #[test]
    fn test_game_message_keeps_subtype_and_raw_contents() {
        let msg = decode(json!({
            "type": "Game/MakeMoveRequest",
            "contents": { "x": 1, "y": 2 }
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Game {
                subtype: "MakeMoveRequest".into(),
                contents: json!({ "x": 1, "y": 2 }),
            }
        );
        assert_eq!(msg.kind(), "Game/MakeMoveRequest");
    }

    #[test]
    fn test_malformed_game_tags_are_rejected() {
        for tag in ["Game", "Game/", "Game/a/b"] {
            let err = decode(json!({ "type": tag })).unwrap_err();
            assert!(
                matches!(err, ProtocolError::InvalidGameType(ref t) if t == tag),
                "tag {tag} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected_by_name() {
        let err = decode(json!({ "type": "Foo", "contents": {} })).unwrap_err();
        assert_eq!(err.to_string(), "Foo is an invalid message type");
    }

    #[test]
    fn test_roster_event_tags_are_reserved_but_not_accepted() {
        assert_eq!(PlayerJoinedEvent::TYPE, "PlayerJoinedEvent");
        assert_eq!(PlayerLeftEvent::TYPE, "PlayerLeftEvent");

        for tag in [PlayerJoinedEvent::TYPE, PlayerLeftEvent::TYPE] {
            let err = decode(json!({ "type": tag })).unwrap_err();
            assert!(matches!(err, ProtocolError::UnknownType(_)));
            assert_eq!(err.to_string(), format!("{tag} is an invalid message type"));
        }
    }

    #[test]
    fn test_start_game_response_omits_absent_reason() {
        let env = Envelope::of(&LobbyStartGameResponse {
            status: true,
            reason: None,
        })
        .unwrap();
        assert_eq!(env.contents, json!({ "status": true }));
    }

    #[test]
    fn test_player_list_broadcast_field_name() {
        let env = Envelope::of(&LobbyPlayerListBroadcast {
            player_ids: vec!["a".into(), "b".into()],
        })
        .unwrap();
        assert_eq!(env.kind, "LobbyPlayerListBroadcast");
        assert_eq!(env.contents, json!({ "playerIDs": ["a", "b"] }));
    }

    #[test]
    fn test_closed_broadcast_is_empty_object() {
        let env = Envelope::of(&LobbyClosedBroadcast {}).unwrap();
        assert_eq!(env.contents, json!({}));
    }
}
