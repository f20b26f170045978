use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{RoundId, SessionId};
use domain::{GameId, Round, Spin, SpinType};
use tokio::sync::RwLock;

use crate::{
    LedgerError, Result,
    store::{RoundLookup, RoundRepository, SpinRepository},
};

#[derive(Default)]
struct LedgerState {
    rounds: HashMap<RoundId, Round>,
    round_keys: HashMap<(SessionId, String), RoundId>,
    spins: Vec<Spin>,
}

/// In-memory ledger implementation for testing.
///
/// Holds rounds and spins behind a single lock so find-or-create and the
/// spin uniqueness check are atomic, matching the constraints of the
/// PostgreSQL schema.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored rounds.
    pub async fn round_count(&self) -> usize {
        self.state.read().await.rounds.len()
    }

    /// Returns the number of stored spins.
    pub async fn spin_count(&self) -> usize {
        self.state.read().await.spins.len()
    }

    /// Returns the number of stored spins of one type.
    pub async fn spin_count_of(&self, spin_type: SpinType) -> usize {
        self.state
            .read()
            .await
            .spins
            .iter()
            .filter(|s| s.spin_type == spin_type)
            .count()
    }

    /// Clears all rounds and spins.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.rounds.clear();
        state.round_keys.clear();
        state.spins.clear();
    }
}

#[async_trait]
impl RoundRepository for InMemoryLedger {
    async fn find_or_create(
        &self,
        session_id: SessionId,
        game_id: &GameId,
        external_round_id: &str,
    ) -> Result<RoundLookup> {
        let mut state = self.state.write().await;
        let key = (session_id, external_round_id.to_string());

        if let Some(round_id) = state.round_keys.get(&key)
            && let Some(round) = state.rounds.get(round_id)
        {
            return Ok(RoundLookup {
                round: round.clone(),
                created: false,
            });
        }

        let round = Round::open(session_id, game_id.clone(), external_round_id);
        state.round_keys.insert(key, round.id);
        state.rounds.insert(round.id, round.clone());
        metrics::counter!("ledger_rounds_created_total").increment(1);

        Ok(RoundLookup {
            round,
            created: true,
        })
    }

    async fn find_by_session_and_ext_id(
        &self,
        session_id: SessionId,
        external_round_id: &str,
    ) -> Result<Option<Round>> {
        let state = self.state.read().await;
        Ok(state
            .round_keys
            .get(&(session_id, external_round_id.to_string()))
            .and_then(|id| state.rounds.get(id))
            .cloned())
    }

    async fn find(&self, round_id: RoundId) -> Result<Option<Round>> {
        Ok(self.state.read().await.rounds.get(&round_id).cloned())
    }

    async fn finish(&self, round_id: RoundId) -> Result<Round> {
        let mut state = self.state.write().await;
        let round = state
            .rounds
            .get_mut(&round_id)
            .ok_or(LedgerError::RoundNotFound(round_id))?;
        round.finish(Utc::now());
        Ok(round.clone())
    }
}

#[async_trait]
impl SpinRepository for InMemoryLedger {
    async fn find_by_round_and_type(
        &self,
        round_id: RoundId,
        spin_type: SpinType,
    ) -> Result<Option<Spin>> {
        let state = self.state.read().await;
        Ok(state
            .spins
            .iter()
            .find(|s| s.round_id == Some(round_id) && s.spin_type == spin_type)
            .cloned())
    }

    async fn find_all_by_round(&self, round_id: RoundId) -> Result<Vec<Spin>> {
        let state = self.state.read().await;
        Ok(state
            .spins
            .iter()
            .filter(|s| s.round_id == Some(round_id))
            .cloned()
            .collect())
    }

    async fn save(&self, spin: Spin) -> Result<Spin> {
        let mut state = self.state.write().await;

        // Unique constraint simulation
        let duplicate = state.spins.iter().any(|s| {
            let same_round = spin.round_id.is_some() && s.round_id == spin.round_id;
            s.id == spin.id
                || (same_round
                    && s.spin_type == spin.spin_type
                    && (s.external_transaction_id == spin.external_transaction_id
                        || spin.spin_type != SpinType::Rollback))
        });
        if duplicate {
            return Err(LedgerError::Conflict {
                entity: "spin",
                key: format!(
                    "{} {}",
                    spin.spin_type, spin.external_transaction_id
                ),
            });
        }

        state.spins.push(spin.clone());
        Ok(spin)
    }
}
