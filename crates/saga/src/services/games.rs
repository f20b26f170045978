//! Game catalog lookups.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{Game, GameId};

use crate::error::SagaError;

/// Read access to the synchronized game catalog.
#[async_trait]
pub trait GameCatalog: Send + Sync {
    async fn find_game(&self, game_id: &GameId) -> Result<Option<Game>, SagaError>;
}

/// In-memory game catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGameCatalog {
    games: Arc<RwLock<HashMap<GameId, Game>>>,
}

impl InMemoryGameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a game.
    pub fn upsert(&self, game: Game) {
        self.games
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game.id.clone(), game);
    }

    /// Inserts or replaces a batch of games, returning how many were written.
    pub fn upsert_all(&self, games: impl IntoIterator<Item = Game>) -> usize {
        let mut catalog = self.games.write().unwrap_or_else(PoisonError::into_inner);
        games
            .into_iter()
            .map(|game| catalog.insert(game.id.clone(), game))
            .count()
    }

    pub fn len(&self) -> usize {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GameCatalog for InMemoryGameCatalog {
    async fn find_game(&self, game_id: &GameId) -> Result<Option<Game>, SagaError> {
        Ok(self
            .games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(game_id)
            .cloned())
    }
}
