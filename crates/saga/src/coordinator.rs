//! Entry point bundling the four spin sagas.

use std::sync::Arc;

use common::RoundId;
use domain::{Balance, Round, Session, Spin};
use ledger::{RoundRepository, SpinRepository};

use crate::config::SagaConfig;
use crate::context::{
    EndRoundRequest, PlaceSpinRequest, RollbackSpinRequest, RoundOutcome, SettleSpinRequest,
    SpinOutcome,
};
use crate::error::{SagaError, SagaFailure};
use crate::sagas::{EndRoundSaga, PlaceSpinSaga, RollbackSpinSaga, SettleSpinSaga};
use crate::services::{EventPublisher, GameCatalog, PlayerLimitService, WalletService};

/// The external collaborators shared by every saga.
#[derive(Clone)]
pub struct Collaborators {
    pub rounds: Arc<dyn RoundRepository>,
    pub spins: Arc<dyn SpinRepository>,
    pub wallet: Arc<dyn WalletService>,
    pub limits: Arc<dyn PlayerLimitService>,
    pub games: Arc<dyn GameCatalog>,
    pub events: Arc<dyn EventPublisher>,
}

impl Collaborators {
    /// Uses one ledger for both rounds and spins.
    pub fn with_ledger<L>(
        ledger: L,
        wallet: Arc<dyn WalletService>,
        limits: Arc<dyn PlayerLimitService>,
        games: Arc<dyn GameCatalog>,
        events: Arc<dyn EventPublisher>,
    ) -> Self
    where
        L: RoundRepository + SpinRepository + 'static,
    {
        let ledger = Arc::new(ledger);
        Self {
            rounds: ledger.clone(),
            spins: ledger,
            wallet,
            limits,
            games,
            events,
        }
    }
}

/// Executes spin sagas for the callback layer.
///
/// Every operation builds a fresh context, so concurrent calls never share
/// mutable state.
pub struct SpinCoordinator {
    place: PlaceSpinSaga,
    settle: SettleSpinSaga,
    rollback: RollbackSpinSaga,
    end: EndRoundSaga,
    collaborators: Collaborators,
}

impl SpinCoordinator {
    pub fn new(collaborators: Collaborators, config: SagaConfig) -> Self {
        Self {
            place: PlaceSpinSaga::new(&collaborators, config.place),
            settle: SettleSpinSaga::new(&collaborators, config.settle),
            rollback: RollbackSpinSaga::new(&collaborators, config.rollback),
            end: EndRoundSaga::new(&collaborators, config.end),
            collaborators,
        }
    }

    /// Records a bet.
    pub async fn place(&self, request: PlaceSpinRequest) -> Result<SpinOutcome, SagaFailure> {
        self.place.execute(request).await
    }

    /// Records a win. Returns `None` for a zero win.
    pub async fn settle(
        &self,
        request: SettleSpinRequest,
    ) -> Result<Option<SpinOutcome>, SagaFailure> {
        self.settle.execute(request).await
    }

    /// Reverses a bet or win.
    pub async fn rollback(
        &self,
        request: RollbackSpinRequest,
    ) -> Result<SpinOutcome, SagaFailure> {
        self.rollback.execute(request).await
    }

    /// Finishes a round.
    pub async fn end(&self, request: EndRoundRequest) -> Result<RoundOutcome, SagaFailure> {
        self.end.execute(request).await
    }

    /// Reads the session player's balance.
    pub async fn balance(&self, session: &Session) -> Result<Balance, SagaError> {
        self.collaborators
            .wallet
            .balance(session.player_id, &session.currency)
            .await
    }

    /// Loads a round with its spins, oldest first.
    pub async fn round_with_spins(
        &self,
        round_id: RoundId,
    ) -> Result<Option<(Round, Vec<Spin>)>, SagaError> {
        let Some(round) = self.collaborators.rounds.find(round_id).await? else {
            return Ok(None);
        };
        let spins = self.collaborators.spins.find_all_by_round(round.id).await?;
        Ok(Some((round, spins)))
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}
