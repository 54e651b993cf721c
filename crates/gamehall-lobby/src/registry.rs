//! The lobby registry: every open lobby, keyed by ID.
//!
//! Lookups happen on every handshake; inserts and deletes only when a lobby
//! opens or closes. `DashMap` shards the table so concurrent lookups never
//! contend on a single lock.

use std::sync::Arc;

use dashmap::DashMap;
use gamehall_protocol::{LobbyId, PlayerId};

use crate::lobby::spawn_lobby;
use crate::{GameCatalog, LobbyConfig, LobbyHandle};

/// Shared, cloneable map of open lobbies.
///
/// A miss from [`get`](Self::get) is a normal outcome: the lobby never
/// existed or has already closed.
#[derive(Debug, Clone, Default)]
pub struct LobbyRegistry {
    lobbies: Arc<DashMap<LobbyId, LobbyHandle>>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a lobby hosted by `host` and registers it.
    pub fn open(
        &self,
        host: PlayerId,
        catalog: Arc<GameCatalog>,
        config: &LobbyConfig,
    ) -> LobbyHandle {
        let lobby_id = LobbyId::generate();
        let handle = spawn_lobby(lobby_id, host, catalog, self.clone(), config);
        self.put(handle.clone());
        tracing::info!(%lobby_id, %host, "lobby created");
        handle
    }

    /// Registers `handle` under its lobby ID, replacing any previous entry.
    pub fn put(&self, handle: LobbyHandle) {
        self.lobbies.insert(handle.lobby_id(), handle);
    }

    pub fn get(&self, lobby_id: &LobbyId) -> Option<LobbyHandle> {
        self.lobbies.get(lobby_id).map(|entry| entry.value().clone())
    }

    /// Removes a lobby, returning its handle if it was registered.
    pub fn delete(&self, lobby_id: &LobbyId) -> Option<LobbyHandle> {
        self.lobbies.remove(lobby_id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(registry: &LobbyRegistry) -> LobbyHandle {
        registry.open(
            PlayerId::generate(),
            Arc::new(GameCatalog::new()),
            &LobbyConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_open_registers_lobby() {
        let registry = LobbyRegistry::new();
        let handle = open(&registry);

        let found = registry.get(&handle.lobby_id()).unwrap();
        assert_eq!(found.lobby_id(), handle.lobby_id());
        assert_eq!(found.host(), handle.host());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let registry = LobbyRegistry::new();
        assert!(registry.get(&LobbyId::generate()).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_delete_then_get_misses() {
        let registry = LobbyRegistry::new();
        let handle = open(&registry);

        assert!(registry.delete(&handle.lobby_id()).is_some());
        assert!(registry.get(&handle.lobby_id()).is_none());
        assert!(registry.delete(&handle.lobby_id()).is_none());
    }

    #[tokio::test]
    async fn test_clones_share_the_same_table() {
        let registry = LobbyRegistry::new();
        let other = registry.clone();
        let handle = open(&registry);

        assert!(other.get(&handle.lobby_id()).is_some());
    }

    #[tokio::test]
    async fn test_closing_lobby_unregisters_it() {
        let registry = LobbyRegistry::new();
        let handle = open(&registry);

        handle.close().await.unwrap();
        // The actor deletes its entry before it stops accepting requests,
        // so a failed info() means the delete has happened.
        while handle.info().await.is_ok() {
            tokio::task::yield_now().await;
        }

        assert!(registry.get(&handle.lobby_id()).is_none());
    }
}
