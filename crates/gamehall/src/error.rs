//! Unified error type for Gamehall.

use axum::http::header::InvalidHeaderValue;
use gamehall_lobby::LobbyError;
use gamehall_protocol::ProtocolError;
use gamehall_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum GamehallError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown message type).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby-level error (not found, closed, duplicate join).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A rejected control-plane request.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Configuration couldn't be loaded.
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// The configured frontend host isn't a valid header value.
    #[error("invalid frontend host: {0}")]
    FrontendHost(#[from] InvalidHeaderValue),

    /// Binding or serving the listener failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the gateway's control-plane operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No `playerID` was supplied.
    #[error("missing playerID parameter")]
    MissingPlayerId,

    /// The supplied `playerID` isn't a well-formed identifier.
    #[error(transparent)]
    InvalidPlayerId(ProtocolError),
}
