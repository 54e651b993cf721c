//! # Gamehall
//!
//! Real-time lobby server for turn-based multiplayer web games.
//!
//! Players create a lobby over HTTP, connect over WebSocket, and join it
//! with a `LobbyJoinRequest`. The lobby's host picks a game from a static
//! [`GameCatalog`]; from then on `Game/<subtype>` messages are routed to
//! that game's [`GameService`] and its broadcasts fanned back out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gamehall::prelude::*;
//!
//! # async fn start() -> Result<(), GamehallError> {
//! let server = GamehallServer::builder()
//!     .config(ServerConfig::load()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! HTTP / WebSocket (server) → Gateway → connection handler
//!     → LobbyHandle ─queue─▶ lobby actor ─▶ GameService
//!     ◀─outbox─ write task ◀─ fan-out
//! ```

mod config;
mod error;
mod gateway;
mod handler;
mod server;

pub use config::{ENV_PREFIX, ServerConfig};
pub use error::{GamehallError, GatewayError};
pub use gateway::Gateway;
pub use server::{GamehallServer, GamehallServerBuilder};

pub use gamehall_lobby::{GameCatalog, GameService};

/// Convenience re-exports for the common path.
pub mod prelude {
    pub use crate::{
        GamehallError, GamehallServer, GamehallServerBuilder, Gateway, ServerConfig,
    };
    pub use gamehall_games::TicTacToe;
    pub use gamehall_lobby::{
        GameCatalog, GameService, GameSink, LobbyConfig, ValidationError,
    };
    pub use gamehall_protocol::{Envelope, ErrorResponse, LobbyId, Message, PlayerId};
}
