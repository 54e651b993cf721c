//! The gateway: what the HTTP and WebSocket surface calls into.

use std::sync::Arc;
use std::time::Duration;

use gamehall_lobby::{GameCatalog, LobbyConfig, LobbyError, LobbyRegistry};
use gamehall_protocol::{JsonCodec, LobbyId, PlayerId};
use gamehall_transport::{FrameSink, FrameStream};

use crate::handler::handle_connection;
use crate::{GatewayError, ServerConfig};

/// Shared server state behind every route. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

struct Inner {
    registry: LobbyRegistry,
    catalog: Arc<GameCatalog>,
    lobby_config: LobbyConfig,
    outbound_capacity: usize,
    keepalive: Option<Duration>,
    codec: JsonCodec,
}

impl Gateway {
    pub fn new(catalog: GameCatalog, config: &ServerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: LobbyRegistry::new(),
                catalog: Arc::new(catalog),
                lobby_config: config.lobby.clone(),
                outbound_capacity: config.outbound_capacity,
                keepalive: config.keepalive(),
                codec: JsonCodec,
            }),
        }
    }

    /// Allocates a new player identifier.
    pub fn create_player(&self) -> PlayerId {
        let player_id = PlayerId::generate();
        tracing::debug!(%player_id, "player created");
        player_id
    }

    /// Opens a lobby hosted by `player_id` and returns its ID.
    pub fn create_lobby(&self, player_id: &str) -> Result<LobbyId, GatewayError> {
        let host = PlayerId::parse(player_id).map_err(GatewayError::InvalidPlayerId)?;
        let lobby = self.inner.registry.open(
            host,
            Arc::clone(&self.inner.catalog),
            &self.inner.lobby_config,
        );
        Ok(lobby.lobby_id())
    }

    /// Asks a lobby to close. Members get `LobbyClosedBroadcast`.
    pub async fn close_lobby(&self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        let lobby = self
            .inner
            .registry
            .get(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;
        lobby.close().await
    }

    /// Runs a connection from handshake to teardown.
    ///
    /// Returns once the client is gone and its outbound queue has been
    /// flushed.
    pub async fn accept<S, R>(&self, sink: S, stream: R)
    where
        S: FrameSink,
        R: FrameStream,
    {
        handle_connection(self.clone(), sink, stream).await;
    }

    pub fn registry(&self) -> &LobbyRegistry {
        &self.inner.registry
    }

    pub fn catalog(&self) -> &GameCatalog {
        &self.inner.catalog
    }

    pub(crate) fn codec(&self) -> JsonCodec {
        self.inner.codec
    }

    pub(crate) fn outbound_capacity(&self) -> usize {
        self.inner.outbound_capacity
    }

    pub(crate) fn keepalive(&self) -> Option<Duration> {
        self.inner.keepalive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> Gateway {
        Gateway::new(GameCatalog::new(), &ServerConfig::default())
    }

    #[test]
    fn test_create_player_is_unique() {
        let gateway = gateway();
        assert_ne!(gateway.create_player(), gateway.create_player());
    }

    #[tokio::test]
    async fn test_create_lobby_registers_host() {
        let gateway = gateway();
        let host = gateway.create_player();

        let lobby_id = gateway.create_lobby(&host.to_string()).unwrap();

        let lobby = gateway.registry().get(&lobby_id).unwrap();
        assert_eq!(lobby.host(), host);
    }

    #[tokio::test]
    async fn test_create_lobby_rejects_malformed_id() {
        let gateway = gateway();
        let err = gateway.create_lobby("host").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPlayerId(_)));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn test_close_unknown_lobby() {
        let gateway = gateway();
        let id = LobbyId::generate();
        assert_eq!(gateway.close_lobby(id).await, Err(LobbyError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_close_lobby_unregisters_it() {
        let gateway = gateway();
        let host = gateway.create_player();
        let lobby_id = gateway.create_lobby(&host.to_string()).unwrap();
        let lobby = gateway.registry().get(&lobby_id).unwrap();

        gateway.close_lobby(lobby_id).await.unwrap();
        while !lobby.is_closed() {
            tokio::task::yield_now().await;
        }

        assert!(gateway.registry().get(&lobby_id).is_none());
    }
}
