//! Player bet limits.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::PlayerId;
use domain::Money;

use crate::error::SagaError;

/// Responsible-gaming limits of a player.
#[async_trait]
pub trait PlayerLimitService: Send + Sync {
    /// Returns the player's current maximum bet, if one is set.
    async fn find_current_bet_limit(&self, player_id: PlayerId)
    -> Result<Option<Money>, SagaError>;
}

/// In-memory limit service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlayerLimitService {
    limits: Arc<RwLock<HashMap<PlayerId, Money>>>,
}

impl InMemoryPlayerLimitService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum bet of a player.
    pub fn set_bet_limit(&self, player_id: PlayerId, limit: Money) {
        self.limits
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(player_id, limit);
    }
}

#[async_trait]
impl PlayerLimitService for InMemoryPlayerLimitService {
    async fn find_current_bet_limit(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<Money>, SagaError> {
        Ok(self
            .limits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player_id)
            .copied())
    }
}
