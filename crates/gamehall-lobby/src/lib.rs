//! Lobbies for Gamehall.
//!
//! Each lobby runs as its own Tokio task (an actor) that owns the roster,
//! the host, and the running game, and processes one request at a time
//! from a bounded inbound queue.
//!
//! # Key types
//!
//! - [`GameService`]: the trait a pluggable game implements
//! - [`GameCatalog`]: the static name → game table lobbies resolve against
//! - [`LobbyRegistry`]: opens lobbies and looks them up by ID
//! - [`LobbyHandle`]: send requests to a running lobby actor
//! - [`LobbyConfig`]: queue capacities

mod catalog;
mod config;
mod error;
mod game;
mod lobby;
mod registry;

pub use catalog::GameCatalog;
pub use config::{LobbyConfig, LobbyPhase};
pub use error::LobbyError;
pub use game::{GameRequest, GameService, GameSink, ValidationError};
pub use lobby::{LobbyHandle, LobbyInfo, LobbyMessage, PlayerOutbox};
pub use registry::LobbyRegistry;
