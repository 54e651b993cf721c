//! Built-in game services for Gamehall.
//!
//! Each game implements [`GameService`](gamehall_lobby::GameService) and is
//! registered by name in [`default_catalog`].

pub mod tictactoe;

use gamehall_lobby::GameCatalog;

pub use tictactoe::TicTacToe;

/// A catalog with every built-in game registered.
pub fn default_catalog() -> GameCatalog {
    GameCatalog::new().register::<TicTacToe>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_tictactoe() {
        let catalog = default_catalog();
        assert!(catalog.contains("tictactoe"));
        assert_eq!(catalog.names(), vec!["tictactoe"]);
    }
}
