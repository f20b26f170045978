use async_trait::async_trait;
use common::{RoundId, SessionId};
use domain::{GameId, Round, Spin, SpinType};

use crate::Result;

/// Result of [`RoundRepository::find_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundLookup {
    pub round: Round,
    /// True if this call inserted the round.
    pub created: bool,
}

/// Durable storage for rounds.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait RoundRepository: Send + Sync {
    /// Returns the round for `(session_id, external_round_id)`, creating it if absent.
    ///
    /// Concurrent calls with the same key converge on the same round id: the
    /// uniqueness constraint decides the winner and losers read the winner's row.
    async fn find_or_create(
        &self,
        session_id: SessionId,
        game_id: &GameId,
        external_round_id: &str,
    ) -> Result<RoundLookup>;

    /// Looks up a round by its aggregator key.
    async fn find_by_session_and_ext_id(
        &self,
        session_id: SessionId,
        external_round_id: &str,
    ) -> Result<Option<Round>>;

    /// Looks up a round by id.
    async fn find(&self, round_id: RoundId) -> Result<Option<Round>>;

    /// Marks a round finished and returns it.
    ///
    /// Finishing an already finished round is a no-op that keeps the original
    /// `finished_at`.
    async fn finish(&self, round_id: RoundId) -> Result<Round>;
}

/// Durable, insert-only storage for spins.
#[async_trait]
pub trait SpinRepository: Send + Sync {
    /// Returns the earliest spin of the given type in a round.
    async fn find_by_round_and_type(
        &self,
        round_id: RoundId,
        spin_type: SpinType,
    ) -> Result<Option<Spin>>;

    /// Returns every spin of a round, oldest first.
    async fn find_all_by_round(&self, round_id: RoundId) -> Result<Vec<Spin>>;

    /// Inserts a spin.
    ///
    /// Fails with `Conflict` if a spin with the same `(round, type,
    /// transaction id)` already exists, or if the round already holds a
    /// PLACE (or SETTLE) spin. Callers check for replays first.
    async fn save(&self, spin: Spin) -> Result<Spin>;
}

/// Extension trait providing convenience lookups for spin repositories.
#[async_trait]
pub trait SpinRepositoryExt: SpinRepository {
    /// Finds the spin of a round recorded for an aggregator transaction id.
    async fn find_by_transaction(
        &self,
        round_id: RoundId,
        spin_type: SpinType,
        external_transaction_id: &str,
    ) -> Result<Option<Spin>> {
        Ok(self
            .find_all_by_round(round_id)
            .await?
            .into_iter()
            .find(|s| {
                s.spin_type == spin_type && s.external_transaction_id == external_transaction_id
            }))
    }

    /// Finds the rollback spin that reverses `original`, if any.
    async fn find_rollback_of(
        &self,
        round_id: RoundId,
        original: &Spin,
    ) -> Result<Option<Spin>> {
        Ok(self
            .find_all_by_round(round_id)
            .await?
            .into_iter()
            .find(|s| s.spin_type == SpinType::Rollback && s.reference_id == Some(original.id)))
    }
}

// Blanket implementation for all SpinRepository implementations
impl<T: SpinRepository + ?Sized> SpinRepositoryExt for T {}
