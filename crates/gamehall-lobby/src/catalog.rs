//! The static name → game service table.

use std::collections::HashMap;
use std::fmt;

use crate::GameService;
use crate::game::ErasedGame;

/// Every game a server can start, keyed by [`GameService::NAME`].
///
/// Built once at startup and shared read-only by all lobbies:
///
/// ```ignore
/// let catalog = GameCatalog::new().register::<TicTacToe>();
/// ```
#[derive(Clone, Default)]
pub struct GameCatalog {
    games: HashMap<&'static str, ErasedGame>,
}

impl GameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `G` under its name. A later registration with the same name
    /// replaces the earlier one.
    pub fn register<G: GameService>(mut self) -> Self {
        if self.games.insert(G::NAME, ErasedGame::of::<G>()).is_some() {
            tracing::warn!(game = G::NAME, "game registered twice, replacing");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.games.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.games.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<ErasedGame> {
        self.games.get(name).copied()
    }
}

impl fmt::Debug for GameCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameCatalog")
            .field("games", &self.names())
            .finish()
    }
}
