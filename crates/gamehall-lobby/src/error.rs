//! Error types for the lobby layer.

use gamehall_protocol::{LobbyId, PlayerId};

/// Errors returned by lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// No lobby is registered under this ID.
    #[error("lobby {0} does not exist")]
    NotFound(LobbyId),

    /// The lobby actor has stopped; its inbound queue is closed.
    #[error("lobby {0} has been closed")]
    Unavailable(LobbyId),

    /// The player is already on this lobby's roster.
    #[error("player {0} already joined lobby {1}")]
    AlreadyJoined(PlayerId, LobbyId),
}
