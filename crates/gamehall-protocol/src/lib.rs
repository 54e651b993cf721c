//! Wire protocol for Gamehall.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identifiers** ([`PlayerId`], [`LobbyId`]): opaque UUID newtypes.
//! - **Envelope** ([`Envelope`], [`Message`]): the `{type, contents}`
//!   wrapper around every frame.
//! - **Catalog** ([`ClientMessage`] and the payload structs): the closed
//!   set of message kinds.
//! - **Codec** ([`Codec`], [`JsonCodec`]): envelopes to and from bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Envelope / ClientMessage) → Lobby (actor)
//! ```

mod codec;
mod envelope;
mod error;
mod ids;
mod messages;

pub use codec::{Codec, JsonCodec};
pub use envelope::{Envelope, Message, decode_contents};
pub use error::ProtocolError;
pub use ids::{LobbyId, PlayerId};
pub use messages::{
    ClientMessage, ErrorResponse, GAME_NAMESPACE, LobbyClosedBroadcast,
    LobbyDoesNotExistResponse, LobbyJoinRequest, LobbyLeaveRequest,
    LobbyPlayerListBroadcast, LobbyStartGameBroadcast, LobbyStartGameRequest,
    LobbyStartGameResponse, PlayerJoinedEvent, PlayerLeftEvent,
};
