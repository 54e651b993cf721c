//! Per-connection handler: join handshake, message routing, and teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a write task draining the connection's outbound queue. The flow is:
//!   1. Wait for `LobbyJoinRequest` → validate → join the lobby
//!   2. Loop: decode envelopes → forward to the lobby actor
//!   3. On disconnect: leave the lobby, flush the outbox, close the link
//!
//! A `LobbyLeaveRequest`, or a lobby that closes underneath us, sends the
//! connection back to step 1 instead of dropping it.

use std::fmt;
use std::ops::ControlFlow;

use gamehall_lobby::{LobbyError, LobbyHandle, LobbyMessage, PlayerOutbox};
use gamehall_protocol::{
    ClientMessage, Codec, Envelope, ErrorResponse, LobbyDoesNotExistResponse,
    LobbyId, LobbyJoinRequest, Message, PlayerId,
};
use gamehall_transport::{
    ConnectionId, FrameSink, FrameStream, channel, run_keepalive, run_writer,
};
use tokio::task::JoinHandle;

use crate::Gateway;

/// Where a connection is in its lifecycle.
enum ConnectionState {
    /// Upgraded; the next message must be `LobbyJoinRequest`.
    AwaitingHandshake,
    /// Joined to `lobby` as `player_id`.
    Active {
        player_id: PlayerId,
        lobby: LobbyHandle,
    },
    /// Teardown is in progress.
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingHandshake => "awaiting-handshake",
            Self::Active { .. } => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Everything the read loop owns for one connection.
///
/// Dropping it without running [`teardown`](Self::teardown) (the handler
/// task was cancelled) still removes the player from its lobby and stops
/// the write task.
struct Connection {
    conn_id: ConnectionId,
    gateway: Gateway,
    outbox: PlayerOutbox,
    state: ConnectionState,
    keepalive: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, R>(gateway: Gateway, sink: S, mut stream: R)
where
    S: FrameSink,
    R: FrameStream,
{
    let conn_id = ConnectionId::next();
    let (outbox, queue) = channel(conn_id, gateway.outbound_capacity());
    let codec = gateway.codec();
    let writer = tokio::spawn(run_writer(sink, queue, move |envelope: &Envelope| {
        codec.encode(envelope)
    }));

    tracing::debug!(%conn_id, "connection accepted");

    let mut conn = Connection {
        conn_id,
        gateway,
        outbox,
        state: ConnectionState::AwaitingHandshake,
        keepalive: None,
        writer: Some(writer),
    };

    loop {
        let data = match stream.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed by client");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        if conn.handle_frame(&data).await.is_break() {
            break;
        }
    }

    conn.teardown().await;
}

impl Connection {
    /// Decodes one frame and dispatches it according to the current state.
    async fn handle_frame(&mut self, data: &[u8]) -> ControlFlow<()> {
        let decoded = self
            .gateway
            .codec()
            .decode::<Envelope>(data)
            .and_then(ClientMessage::try_from);

        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    conn_id = %self.conn_id, state = %self.state, error = %e,
                    "rejected frame"
                );
                self.send_error(e.to_string()).await;
                return ControlFlow::Continue(());
            }
        };

        let joined = match &self.state {
            ConnectionState::AwaitingHandshake => None,
            ConnectionState::Active { player_id, lobby } => Some((*player_id, lobby.clone())),
            ConnectionState::Closing | ConnectionState::Closed => return ControlFlow::Break(()),
        };

        match (joined, message) {
            (Some((player_id, lobby)), message) => {
                self.route(player_id, lobby, message).await;
                ControlFlow::Continue(())
            }
            (None, ClientMessage::LobbyJoin(request)) => self.handshake(request).await,
            (None, other) => {
                self.send_error(format!(
                    "must send {} before {}",
                    LobbyJoinRequest::TYPE,
                    other.kind()
                ))
                .await;
                ControlFlow::Continue(())
            }
        }
    }

    /// Runs the join handshake. `Break` means the connection should close.
    async fn handshake(&mut self, request: LobbyJoinRequest) -> ControlFlow<()> {
        let conn_id = self.conn_id;

        let player_id = match PlayerId::parse(&request.player_id) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "handshake rejected");
                self.send_error(e.to_string()).await;
                return ControlFlow::Continue(());
            }
        };

        // A malformed lobby ID can't name a registered lobby.
        let lobby = LobbyId::parse(&request.lobby_id)
            .ok()
            .and_then(|lobby_id| self.gateway.registry().get(&lobby_id));
        let Some(lobby) = lobby else {
            tracing::info!(
                %conn_id, %player_id, lobby_id = %request.lobby_id,
                "lobby does not exist, closing connection"
            );
            self.send(&LobbyDoesNotExistResponse {}).await;
            return ControlFlow::Break(());
        };

        let lobby_id = lobby.lobby_id();
        match lobby.join(player_id, self.outbox.clone()).await {
            Ok(()) => {
                tracing::info!(%conn_id, %player_id, %lobby_id, "player joined lobby");
                self.state = ConnectionState::Active { player_id, lobby };
                self.start_keepalive();
                ControlFlow::Continue(())
            }
            Err(e @ LobbyError::AlreadyJoined(..)) => {
                tracing::debug!(%conn_id, error = %e, "handshake rejected");
                self.send_error(e.to_string()).await;
                ControlFlow::Continue(())
            }
            Err(e) => {
                // Closed between the registry lookup and the join.
                tracing::info!(
                    %conn_id, %player_id, error = %e,
                    "lobby does not exist, closing connection"
                );
                self.send(&LobbyDoesNotExistResponse {}).await;
                ControlFlow::Break(())
            }
        }
    }

    /// Forwards a message from a joined player to its lobby.
    async fn route(&mut self, player_id: PlayerId, lobby: LobbyHandle, message: ClientMessage) {
        let message = match message {
            ClientMessage::LobbyJoin(_) => {
                self.send_error(format!("already joined lobby {}", lobby.lobby_id()))
                    .await;
                return;
            }
            ClientMessage::LobbyLeave(_) => {
                self.leave_lobby(player_id, &lobby).await;
                self.stop_keepalive();
                self.state = ConnectionState::AwaitingHandshake;
                return;
            }
            ClientMessage::LobbyStartGame(request) => LobbyMessage::StartGame { game: request.game },
            ClientMessage::Game { subtype, contents } => LobbyMessage::Game { subtype, contents },
        };

        if let Err(e) = lobby.submit(player_id, self.outbox.clone(), message).await {
            tracing::debug!(
                conn_id = %self.conn_id, %player_id, error = %e,
                "lobby unavailable, awaiting a new handshake"
            );
            self.send_error(e.to_string()).await;
            self.stop_keepalive();
            self.state = ConnectionState::AwaitingHandshake;
        }
    }

    /// Leaves the lobby, stops keepalive, and closes the write task.
    /// Idempotent.
    async fn teardown(&mut self) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closing);
        if matches!(state, ConnectionState::Closing | ConnectionState::Closed) {
            self.state = state;
            return;
        }
        if let ConnectionState::Active { player_id, lobby } = state {
            self.leave_lobby(player_id, &lobby).await;
        }
        self.stop_keepalive();

        if let Err(e) = self.outbox.close().await {
            tracing::debug!(conn_id = %self.conn_id, error = %e, "writer already gone");
        }
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                tracing::warn!(conn_id = %self.conn_id, error = %e, "writer task failed");
            }
        }

        self.state = ConnectionState::Closed;
        tracing::debug!(conn_id = %self.conn_id, "connection closed");
    }

    async fn leave_lobby(&self, player_id: PlayerId, lobby: &LobbyHandle) {
        match lobby.leave(player_id).await {
            Ok(()) => tracing::info!(
                conn_id = %self.conn_id, %player_id, lobby_id = %lobby.lobby_id(),
                "player left lobby"
            ),
            Err(e) => tracing::debug!(
                conn_id = %self.conn_id, %player_id, error = %e,
                "leave skipped"
            ),
        }
    }

    fn start_keepalive(&mut self) {
        self.stop_keepalive();
        if let Some(period) = self.gateway.keepalive() {
            self.keepalive = Some(tokio::spawn(run_keepalive(self.outbox.clone(), period)));
        }
    }

    fn stop_keepalive(&mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.abort();
        }
    }

    async fn send<M: Message>(&self, message: &M) {
        let envelope = match Envelope::of(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(conn_id = %self.conn_id, error = %e, "unable to encode reply");
                return;
            }
        };
        if let Err(e) = self.outbox.send(envelope).await {
            tracing::debug!(conn_id = %self.conn_id, error = %e, "reply dropped");
        }
    }

    async fn send_error(&self, reason: impl Into<String>) {
        self.send(&ErrorResponse::new(reason)).await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.stop_keepalive();

        if let ConnectionState::Active { player_id, lobby } =
            std::mem::replace(&mut self.state, ConnectionState::Closed)
        {
            // Drop is synchronous, so the leave goes through a spawned task.
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = lobby.leave(player_id).await;
                });
            }
        }

        if self.writer.is_some() && !self.outbox.try_close() {
            tracing::debug!(conn_id = %self.conn_id, "close sentinel not queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gamehall_lobby::GameCatalog;
    use gamehall_transport::TransportError;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    use crate::ServerConfig;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::AwaitingHandshake.to_string(), "awaiting-handshake");
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    // In-memory link halves so the handler can run without a socket.

    #[derive(Clone, Default)]
    struct MemorySink {
        frames: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl MemorySink {
        fn frames(&self) -> Vec<serde_json::Value> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|text| serde_json::from_str(text).unwrap())
                .collect()
        }
    }

    impl FrameSink for MemorySink {
        async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
            self.frames.lock().unwrap().push(String::from_utf8(data).unwrap());
            Ok(())
        }

        async fn ping(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct MemoryStream(mpsc::UnboundedReceiver<Vec<u8>>);

    impl FrameStream for MemoryStream {
        async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            Ok(self.0.recv().await)
        }
    }

    fn gateway() -> Gateway {
        let config = ServerConfig {
            keepalive_secs: 0,
            ..ServerConfig::default()
        };
        Gateway::new(GameCatalog::new(), &config)
    }

    /// Feeds `frames` to a fresh connection, then hangs up.
    async fn run(gateway: &Gateway, frames: &[&str]) -> MemorySink {
        let sink = MemorySink::default();
        let (tx, rx) = mpsc::unbounded_channel();
        for frame in frames {
            tx.send(frame.as_bytes().to_vec()).unwrap();
        }
        drop(tx);

        handle_connection(gateway.clone(), sink.clone(), MemoryStream(rx)).await;
        sink
    }

    #[tokio::test]
    async fn test_malformed_json_is_not_fatal() {
        let gateway = gateway();
        let sink = run(&gateway, &["{oops", r#"{"type":"LobbyLeaveRequest"}"#]).await;

        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "ErrorResponse");
        assert!(
            frames[0]["contents"]["reason"]
                .as_str()
                .unwrap()
                .starts_with("unable to decode message")
        );
        assert_eq!(
            frames[1]["contents"]["reason"],
            "must send LobbyJoinRequest before LobbyLeaveRequest"
        );
        assert!(*sink.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_unknown_lobby_closes_connection() {
        let gateway = gateway();
        let player = gateway.create_player();
        let join = format!(
            r#"{{"type":"LobbyJoinRequest","contents":{{"playerID":"{player}","lobbyID":"{}"}}}}"#,
            LobbyId::generate()
        );
        // The second frame must never be read.
        let sink = run(&gateway, &[&join, r#"{"type":"Foo"}"#]).await;

        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "LobbyDoesNotExistResponse");
        assert!(*sink.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_disconnect_leaves_lobby() {
        let gateway = gateway();
        let host = gateway.create_player();
        let guest = gateway.create_player();
        let lobby_id = gateway.create_lobby(&host.to_string()).unwrap();
        let join = format!(
            r#"{{"type":"LobbyJoinRequest","contents":{{"playerID":"{guest}","lobbyID":"{lobby_id}"}}}}"#
        );

        let sink = run(&gateway, &[&join]).await;
        assert_eq!(sink.frames()[0]["type"], "LobbyPlayerListBroadcast");

        let lobby = gateway.registry().get(&lobby_id).unwrap();
        let info = lobby.info().await.unwrap();
        assert!(info.players.is_empty());
    }
}
