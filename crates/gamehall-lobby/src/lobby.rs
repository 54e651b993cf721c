//! Lobby actor: one Tokio task per lobby, owning its roster and game.
//!
//! All mutation of a lobby happens inside [`LobbyActor::run`], which drains
//! a single bounded inbound queue one request at a time. Connections talk
//! to it only through a cloned [`LobbyHandle`]; nothing else ever touches
//! the roster or the game state, so no locks are involved.
//!
//! While a game is running a second task, the *fan-out*, delivers the
//! game's [`GameRequest`]s to the targeted players. It keeps its own copy
//! of the roster, refreshed by the actor whenever someone joins or leaves.
//! Direct replies to game messages go through the same queue, so all game
//! traffic reaching one player arrives in the order it was produced.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use gamehall_protocol::{
    Envelope, ErrorResponse, GAME_NAMESPACE, LobbyClosedBroadcast, LobbyId,
    LobbyPlayerListBroadcast, LobbyStartGameBroadcast, LobbyStartGameResponse,
    Message, PlayerId,
};
use gamehall_transport::Outbox;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::game::{ErasedGame, GameState};
use crate::{
    GameCatalog, GameRequest, GameSink, LobbyConfig, LobbyError, LobbyPhase,
    LobbyRegistry,
};

/// Outbound queue of one player's connection.
pub type PlayerOutbox = Outbox<Envelope>;

/// A lobby-level message from a joined player.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyMessage {
    /// `LobbyStartGameRequest{game}`.
    StartGame { game: String },
    /// `Game/<subtype>` with its untyped contents.
    Game { subtype: String, contents: Value },
}

/// Requests accepted by the lobby actor's inbound queue.
pub(crate) enum LobbyRequest {
    /// Add a player to the roster and rebroadcast the player list.
    Join {
        player_id: PlayerId,
        outbox: PlayerOutbox,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    /// Remove a player. The host leaving closes the lobby.
    Leave { player_id: PlayerId },

    /// Route a start-game or game message. Replies go to `reply_to`.
    Message {
        player_id: PlayerId,
        reply_to: PlayerOutbox,
        message: LobbyMessage,
    },

    /// Snapshot of the lobby's metadata.
    Info { reply: oneshot::Sender<LobbyInfo> },

    /// Close the lobby.
    Close,
}

/// A point-in-time view of a lobby, for callers outside the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyInfo {
    pub lobby_id: LobbyId,
    pub host: PlayerId,
    pub phase: LobbyPhase,
    /// Current roster, ascending.
    pub players: Vec<PlayerId>,
    /// Name of the running game, if any.
    pub game: Option<String>,
}

// ---------------------------------------------------------------------------
// LobbyHandle
// ---------------------------------------------------------------------------

/// Handle to a running lobby actor.
///
/// Cheap to clone. Every method enqueues onto the lobby's bounded inbound
/// queue and waits for room if it's full. Once the lobby has closed, every
/// method fails with [`LobbyError::Unavailable`].
#[derive(Clone)]
pub struct LobbyHandle {
    lobby_id: LobbyId,
    host: PlayerId,
    sender: mpsc::Sender<LobbyRequest>,
}

impl LobbyHandle {
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// The player who created the lobby.
    pub fn host(&self) -> PlayerId {
        self.host
    }

    /// Returns `true` once the actor has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Adds `player_id` to the roster, delivering lobby traffic to
    /// `outbox` from now on.
    ///
    /// Resolves after the actor has processed the join, so the updated
    /// player list is already queued on every member's outbox.
    pub async fn join(
        &self,
        player_id: PlayerId,
        outbox: PlayerOutbox,
    ) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(LobbyRequest::Join {
            player_id,
            outbox,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?
    }

    /// Removes `player_id` from the roster.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        self.enqueue(LobbyRequest::Leave { player_id }).await
    }

    /// Forwards a message from a joined player. Responses and errors are
    /// delivered to `reply_to`.
    pub async fn submit(
        &self,
        player_id: PlayerId,
        reply_to: PlayerOutbox,
        message: LobbyMessage,
    ) -> Result<(), LobbyError> {
        self.enqueue(LobbyRequest::Message {
            player_id,
            reply_to,
            message,
        })
        .await
    }

    /// Requests a snapshot of the lobby.
    pub async fn info(&self) -> Result<LobbyInfo, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(LobbyRequest::Info { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }

    /// Asks the lobby to close. Queued behind any earlier requests.
    pub async fn close(&self) -> Result<(), LobbyError> {
        self.enqueue(LobbyRequest::Close).await
    }

    async fn enqueue(&self, request: LobbyRequest) -> Result<(), LobbyError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }
}

impl fmt::Debug for LobbyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobbyHandle")
            .field("lobby_id", &self.lobby_id)
            .field("host", &self.host)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Items on a running game's fan-out queue.
enum Fanout {
    /// Replace the fan-out task's view of the roster.
    Roster(Vec<(PlayerId, PlayerOutbox)>),
    /// Deliver a game message to its targets.
    Deliver(GameRequest),
    /// Deliver a handler's direct reply to the requester, unchanged.
    Reply(PlayerOutbox, Envelope),
}

struct ActiveGame {
    service: ErasedGame,
    state: GameState,
    fanout: mpsc::Sender<Fanout>,
    fanout_task: JoinHandle<()>,
}

impl ActiveGame {
    /// Closes the fan-out queue and waits until everything already queued
    /// has been delivered.
    async fn finish(self, lobby_id: LobbyId) {
        drop(self.fanout);
        if let Err(e) = self.fanout_task.await {
            tracing::error!(%lobby_id, error = %e, "game fan-out task failed");
        }
    }
}

struct LobbyActor {
    lobby_id: LobbyId,
    host: PlayerId,
    phase: LobbyPhase,
    /// Ordered by player ID, which is also the ID's string order.
    roster: BTreeMap<PlayerId, PlayerOutbox>,
    game: Option<ActiveGame>,
    catalog: Arc<GameCatalog>,
    registry: LobbyRegistry,
    fanout_capacity: usize,
    receiver: mpsc::Receiver<LobbyRequest>,
}

impl LobbyActor {
    async fn run(mut self) {
        tracing::info!(lobby_id = %self.lobby_id, host = %self.host, "lobby opened");

        while let Some(request) = self.receiver.recv().await {
            let flow = match request {
                LobbyRequest::Join {
                    player_id,
                    outbox,
                    reply,
                } => {
                    let result = self.handle_join(player_id, outbox).await;
                    let _ = reply.send(result);
                    ControlFlow::Continue(())
                }
                LobbyRequest::Leave { player_id } => {
                    self.handle_leave(player_id).await
                }
                LobbyRequest::Message {
                    player_id,
                    reply_to,
                    message,
                } => {
                    self.handle_message(player_id, &reply_to, message).await;
                    ControlFlow::Continue(())
                }
                LobbyRequest::Info { reply } => {
                    let _ = reply.send(self.info());
                    ControlFlow::Continue(())
                }
                LobbyRequest::Close => ControlFlow::Break(()),
            };

            if flow.is_break() {
                break;
            }
        }

        self.close().await;
    }

    async fn handle_join(
        &mut self,
        player_id: PlayerId,
        outbox: PlayerOutbox,
    ) -> Result<(), LobbyError> {
        if self.roster.contains_key(&player_id) {
            return Err(LobbyError::AlreadyJoined(player_id, self.lobby_id));
        }

        self.roster.insert(player_id, outbox);
        tracing::info!(
            lobby_id = %self.lobby_id,
            %player_id,
            players = self.roster.len(),
            "player joined"
        );

        self.roster_changed().await;
        Ok(())
    }

    async fn handle_leave(&mut self, player_id: PlayerId) -> ControlFlow<()> {
        if self.roster.remove(&player_id).is_none() {
            tracing::debug!(lobby_id = %self.lobby_id, %player_id, "leave from non-member");
            return ControlFlow::Continue(());
        }

        tracing::info!(
            lobby_id = %self.lobby_id,
            %player_id,
            players = self.roster.len(),
            "player left"
        );

        if player_id == self.host {
            tracing::info!(lobby_id = %self.lobby_id, "host left, closing lobby");
            // The host gets nothing more, not even queued game traffic.
            self.refresh_fanout().await;
            return ControlFlow::Break(());
        }

        self.roster_changed().await;
        ControlFlow::Continue(())
    }

    /// Refreshes the fan-out's roster and broadcasts the sorted player list.
    async fn roster_changed(&mut self) {
        self.refresh_fanout().await;

        let player_ids = self.roster.keys().map(ToString::to_string).collect();
        self.broadcast(&LobbyPlayerListBroadcast { player_ids }).await;
    }

    async fn refresh_fanout(&self) {
        let Some(game) = &self.game else {
            return;
        };
        let members = self
            .roster
            .iter()
            .map(|(id, outbox)| (*id, outbox.clone()))
            .collect();
        if game.fanout.send(Fanout::Roster(members)).await.is_err() {
            tracing::warn!(lobby_id = %self.lobby_id, "game fan-out has stopped");
        }
    }

    async fn handle_message(
        &mut self,
        player_id: PlayerId,
        reply_to: &PlayerOutbox,
        message: LobbyMessage,
    ) {
        if !self.roster.contains_key(&player_id) {
            tracing::warn!(lobby_id = %self.lobby_id, %player_id, "message from non-member");
            let reason = format!("player {player_id} is not in lobby {}", self.lobby_id);
            self.reply(reply_to, &ErrorResponse::new(reason)).await;
            return;
        }

        match message {
            LobbyMessage::StartGame { game } => {
                self.start_game(player_id, reply_to, game).await;
            }
            LobbyMessage::Game { subtype, contents } => {
                self.game_message(player_id, reply_to, &subtype, contents)
                    .await;
            }
        }
    }

    async fn start_game(
        &mut self,
        player_id: PlayerId,
        reply_to: &PlayerOutbox,
        game: String,
    ) {
        if player_id != self.host {
            tracing::debug!(lobby_id = %self.lobby_id, %player_id, "non-host tried to start a game");
            self.reply(reply_to, &ErrorResponse::new("only the host can start a game"))
                .await;
            return;
        }
        if !self.phase.can_start_game() {
            self.reply(reply_to, &ErrorResponse::new("a game is already in progress"))
                .await;
            return;
        }
        let Some(service) = self.catalog.get(&game) else {
            self.reply(reply_to, &ErrorResponse::new("invalid game name"))
                .await;
            return;
        };

        let players: Vec<PlayerId> = self.roster.keys().copied().collect();
        let state = match service.new_state(&players) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(lobby_id = %self.lobby_id, game = service.name, error = %e, "game refused to start");
                let response = LobbyStartGameResponse {
                    status: false,
                    reason: Some(e.to_string()),
                };
                self.reply(reply_to, &response).await;
                return;
            }
        };

        let (tx, rx) = mpsc::channel(self.fanout_capacity.max(1));
        let members = self
            .roster
            .iter()
            .map(|(id, outbox)| (*id, outbox.clone()))
            .collect();
        let fanout_task = tokio::spawn(run_fanout(self.lobby_id, members, rx));

        self.game = Some(ActiveGame {
            service,
            state,
            fanout: tx,
            fanout_task,
        });
        self.phase = LobbyPhase::InGame;
        tracing::info!(
            lobby_id = %self.lobby_id,
            game = service.name,
            players = players.len(),
            "game started"
        );

        let response = LobbyStartGameResponse {
            status: true,
            reason: None,
        };
        self.reply(reply_to, &response).await;
        self.broadcast(&LobbyStartGameBroadcast { game }).await;
    }

    async fn game_message(
        &mut self,
        player_id: PlayerId,
        reply_to: &PlayerOutbox,
        subtype: &str,
        contents: Value,
    ) {
        let Some(game) = self.game.as_mut() else {
            self.reply(reply_to, &ErrorResponse::new("must start a game first"))
                .await;
            return;
        };

        let mut sink = GameSink::new();
        let direct = game.service.handle_request(
            &mut sink,
            &mut game.state,
            player_id,
            subtype,
            contents,
        );
        let fanout = game.fanout.clone();

        let replies = direct.map(|envelope| Fanout::Reply(reply_to.clone(), envelope));
        let items = sink
            .into_requests()
            .into_iter()
            .map(Fanout::Deliver)
            .chain(replies);
        for item in items {
            if fanout.send(item).await.is_err() {
                tracing::warn!(lobby_id = %self.lobby_id, "game fan-out has stopped");
                break;
            }
        }
    }

    /// Runs once, when the loop exits for any reason.
    async fn close(&mut self) {
        if self.phase == LobbyPhase::Closed {
            return;
        }

        // Unregister and stop accepting before anyone is told: a member who
        // sees the closed broadcast must miss on lookup and fail on submit.
        self.registry.delete(&self.lobby_id);
        self.receiver.close();

        // Queued game traffic goes out first. The closed broadcast is the
        // last thing a member hears from this lobby.
        if let Some(game) = self.game.take() {
            game.finish(self.lobby_id).await;
        }
        self.broadcast(&LobbyClosedBroadcast {}).await;
        self.phase = LobbyPhase::Closed;

        let unavailable = LobbyError::Unavailable(self.lobby_id);
        while let Some(request) = self.receiver.recv().await {
            match request {
                LobbyRequest::Join { reply, .. } => {
                    let _ = reply.send(Err(unavailable.clone()));
                }
                LobbyRequest::Message { reply_to, .. } => {
                    self.reply(&reply_to, &ErrorResponse::new(unavailable.to_string()))
                        .await;
                }
                LobbyRequest::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                LobbyRequest::Leave { .. } | LobbyRequest::Close => {}
            }
        }

        self.roster.clear();
        tracing::info!(lobby_id = %self.lobby_id, "lobby closed");
    }

    fn info(&self) -> LobbyInfo {
        LobbyInfo {
            lobby_id: self.lobby_id,
            host: self.host,
            phase: self.phase,
            players: self.roster.keys().copied().collect(),
            game: self.game.as_ref().map(|g| g.service.name.to_string()),
        }
    }

    async fn reply<M: Message>(&self, to: &PlayerOutbox, message: &M) {
        if let Some(envelope) = self.encode(message) {
            deliver(to, envelope).await;
        }
    }

    async fn broadcast<M: Message>(&self, message: &M) {
        let Some(envelope) = self.encode(message) else {
            return;
        };
        for outbox in self.roster.values() {
            deliver(outbox, envelope.clone()).await;
        }
    }

    fn encode<M: Message>(&self, message: &M) -> Option<Envelope> {
        match Envelope::of(message) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::error!(lobby_id = %self.lobby_id, kind = M::TYPE, error = %e, "failed to encode message");
                None
            }
        }
    }
}

/// Queues `envelope` on a player's outbox. A closed outbox means the
/// connection is already tearing down, so the failure is only logged.
async fn deliver(outbox: &PlayerOutbox, envelope: Envelope) {
    if let Err(e) = outbox.send(envelope).await {
        tracing::debug!(conn_id = %outbox.id(), error = %e, "dropping message for closed connection");
    }
}

/// Drains a game's fan-out queue, prefixing each message with `Game/`.
async fn run_fanout(
    lobby_id: LobbyId,
    members: Vec<(PlayerId, PlayerOutbox)>,
    mut receiver: mpsc::Receiver<Fanout>,
) {
    let mut roster: HashMap<PlayerId, PlayerOutbox> = members.into_iter().collect();

    while let Some(item) = receiver.recv().await {
        match item {
            Fanout::Roster(members) => {
                roster = members.into_iter().collect();
            }
            Fanout::Reply(outbox, envelope) => deliver(&outbox, envelope).await,
            Fanout::Deliver(GameRequest { targets, envelope }) => {
                let envelope = envelope.namespaced(GAME_NAMESPACE);
                for player_id in &targets {
                    match roster.get(player_id) {
                        Some(outbox) => deliver(outbox, envelope.clone()).await,
                        None => tracing::debug!(
                            %lobby_id,
                            %player_id,
                            kind = %envelope.kind,
                            "game message target is not in the lobby"
                        ),
                    }
                }
            }
        }
    }

    tracing::debug!(%lobby_id, "game fan-out stopped");
}

/// Spawns a lobby actor and returns a handle to it.
///
/// The caller is responsible for putting the handle in `registry`; the
/// actor removes it again when it closes.
pub(crate) fn spawn_lobby(
    lobby_id: LobbyId,
    host: PlayerId,
    catalog: Arc<GameCatalog>,
    registry: LobbyRegistry,
    config: &LobbyConfig,
) -> LobbyHandle {
    let (tx, rx) = mpsc::channel(config.inbound_capacity.max(1));

    let actor = LobbyActor {
        lobby_id,
        host,
        phase: LobbyPhase::Open,
        roster: BTreeMap::new(),
        game: None,
        catalog,
        registry,
        fanout_capacity: config.fanout_capacity,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    LobbyHandle {
        lobby_id,
        host,
        sender: tx,
    }
}
