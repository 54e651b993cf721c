//! The `GameService` trait: the contract every pluggable rules engine
//! satisfies.
//!
//! A lobby knows nothing about any particular game. When the host starts
//! one, the lobby looks the name up in its [`GameCatalog`](crate::GameCatalog),
//! asks the service for an initial state, and from then on hands every
//! `Game/<subtype>` message to [`GameService::handle_request`].
//!
//! The lobby actor is the only caller, so `handle_request` always has
//! exclusive access to the state. No locking is needed inside a game.

use std::any::Any;
use std::collections::HashSet;

use gamehall_protocol::{Envelope, PlayerId};
use serde_json::Value;

/// Why a game refused to start.
///
/// The message is sent back to the host verbatim in
/// `LobbyStartGameResponse.reason`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A message a game wants delivered to some subset of the roster.
///
/// The envelope's `type` is the bare game subtype (`MakeMoveBroadcast`);
/// the lobby adds the `Game/` namespace on the way out.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRequest {
    pub targets: HashSet<PlayerId>,
    pub envelope: Envelope,
}

/// Collects the [`GameRequest`]s emitted during one `handle_request` call.
///
/// Handlers are synchronous; the lobby forwards everything in the sink to
/// the game's fan-out queue after the handler returns, in emit order.
#[derive(Debug, Default)]
pub struct GameSink {
    requests: Vec<GameRequest>,
}

impl GameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `envelope` for every player in `targets`.
    pub fn emit(
        &mut self,
        targets: impl IntoIterator<Item = PlayerId>,
        envelope: Envelope,
    ) {
        self.requests.push(GameRequest {
            targets: targets.into_iter().collect(),
            envelope,
        });
    }

    /// Requests emitted so far.
    pub fn requests(&self) -> &[GameRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<GameRequest> {
        self.requests
    }
}

/// The trait game implementations provide.
///
/// Services are stateless types; all per-match data lives in
/// [`State`](GameService::State), which the lobby owns.
pub trait GameService: Send + Sync + 'static {
    /// The name clients use in `LobbyStartGameRequest.game`.
    const NAME: &'static str;

    /// Per-match state. The lobby actor holds it across awaits, so it must
    /// be shareable between threads.
    type State: Send + Sync + 'static;

    /// Creates the initial state for `players`, given in ascending order.
    ///
    /// Fails if the roster isn't playable (wrong number of players, etc.).
    fn new_state(players: &[PlayerId]) -> Result<Self::State, ValidationError>;

    /// Handles one `Game/<subtype>` message from `player`.
    ///
    /// Broadcasts and targeted messages go into `sink`. A returned envelope
    /// is delivered only to `player`, as is.
    fn handle_request(
        sink: &mut GameSink,
        state: &mut Self::State,
        player: PlayerId,
        subtype: &str,
        contents: Value,
    ) -> Option<Envelope>;
}

// ---------------------------------------------------------------------------
// Type erasure
// ---------------------------------------------------------------------------

/// Boxed state of whichever game a lobby is running.
pub(crate) type GameState = Box<dyn Any + Send + Sync>;

/// A [`GameService`] with its associated types erased, so services with
/// different state types can sit in the same catalog.
#[derive(Clone, Copy)]
pub(crate) struct ErasedGame {
    pub(crate) name: &'static str,
    new_state: fn(&[PlayerId]) -> Result<GameState, ValidationError>,
    handle_request:
        fn(&mut GameSink, &mut GameState, PlayerId, &str, Value) -> Option<Envelope>,
}

impl ErasedGame {
    pub(crate) fn of<G: GameService>() -> Self {
        Self {
            name: G::NAME,
            new_state: erased_new_state::<G>,
            handle_request: erased_handle_request::<G>,
        }
    }

    pub(crate) fn new_state(
        &self,
        players: &[PlayerId],
    ) -> Result<GameState, ValidationError> {
        (self.new_state)(players)
    }

    pub(crate) fn handle_request(
        &self,
        sink: &mut GameSink,
        state: &mut GameState,
        player: PlayerId,
        subtype: &str,
        contents: Value,
    ) -> Option<Envelope> {
        (self.handle_request)(sink, state, player, subtype, contents)
    }
}

fn erased_new_state<G: GameService>(
    players: &[PlayerId],
) -> Result<GameState, ValidationError> {
    let state = G::new_state(players)?;
    Ok(Box::new(state))
}

fn erased_handle_request<G: GameService>(
    sink: &mut GameSink,
    state: &mut GameState,
    player: PlayerId,
    subtype: &str,
    contents: Value,
) -> Option<Envelope> {
    match (**state).downcast_mut::<G::State>() {
        Some(state) => G::handle_request(sink, state, player, subtype, contents),
        None => {
            // Only reachable if a lobby pairs a state with the wrong service.
            tracing::error!(game = G::NAME, "game state has unexpected type");
            None
        }
    }
}
