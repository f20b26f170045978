//! The four spin sagas and the steps they share.

pub mod end;
pub mod place;
pub mod rollback;
pub mod settle;

use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainEvent, Round, Session, Spin, SpinEvent, Split};
use ledger::{LedgerError, RoundRepository, SpinRepository, SpinRepositoryExt};

use crate::error::{Result, SagaError};
use crate::services::{EventPublisher, WalletCommand};
use crate::step::{SagaContext, SagaStep, StepOutcome};

pub use end::EndRoundSaga;
pub use place::PlaceSpinSaga;
pub use rollback::RollbackSpinSaga;
pub use settle::SettleSpinSaga;

/// Fails with `IllegalState` if an earlier step did not fill `value`.
pub(crate) fn required<T>(value: Option<T>, what: &'static str) -> Result<T> {
    value.ok_or_else(|| SagaError::IllegalState(format!("{what} not resolved by an earlier step")))
}

/// Builds a wallet movement for the session's player under `key`.
pub(crate) fn wallet_command(session: &Session, key: &str, split: Split) -> WalletCommand {
    WalletCommand {
        player_id: session.player_id,
        transaction_id: key.to_string(),
        currency: session.currency.clone(),
        split,
    }
}

/// Inserts a spin. A uniqueness conflict on the same transaction id means a
/// concurrent execution of the same callback won the race; its spin is
/// returned with `true`.
pub(crate) async fn save_spin(spins: &dyn SpinRepository, spin: Spin) -> Result<(Spin, bool)> {
    let round_id = spin.round_id;
    let spin_type = spin.spin_type;
    let transaction_id = spin.external_transaction_id.clone();

    match spins.save(spin).await {
        Ok(saved) => Ok((saved, false)),
        Err(LedgerError::Conflict { entity, key }) => {
            if let Some(round_id) = round_id
                && let Some(existing) = spins
                    .find_by_transaction(round_id, spin_type, &transaction_id)
                    .await?
            {
                tracing::info!(
                    spin_id = %existing.id,
                    %spin_type,
                    %transaction_id,
                    "spin recorded concurrently, treating as replay"
                );
                return Ok((existing, true));
            }
            Err(SagaError::DuplicateEntity(format!("{entity}: {key}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Publishes an event. Failures are logged and counted, never propagated.
pub(crate) async fn publish(events: &dyn EventPublisher, saga: &'static str, event: SpinEvent) -> bool {
    match events.publish(&event).await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(
                event_type = event.event_type(),
                correlation_id = event.correlation_id(),
                %error,
                "event publish failed"
            );
            metrics::counter!(
                "events_publish_failed_total",
                "saga" => saga,
                "event_type" => event.event_type()
            )
            .increment(1);
            false
        }
    }
}

pub(crate) fn record_replay(saga: &'static str, spin: &Spin) {
    tracing::info!(spin_id = %spin.id, transaction_id = %spin.external_transaction_id, "replayed callback");
    metrics::counter!("spin_replays_total", "saga" => saga).increment(1);
}

/// Contexts that operate on an existing round.
pub(crate) trait RoundScoped: SagaContext {
    fn session(&self) -> &Session;
    fn external_round_id(&self) -> &str;
    fn set_round(&mut self, round: Round);
}

/// Resolves the round of a settle, rollback or end request.
pub(crate) struct FindRound {
    pub(crate) rounds: Arc<dyn RoundRepository>,
}

#[async_trait]
impl<C: RoundScoped> SagaStep<C> for FindRound {
    fn name(&self) -> &'static str {
        "find_round"
    }

    async fn execute(&self, ctx: &mut C) -> Result<StepOutcome> {
        let session_id = ctx.session().id;
        let external_round_id = ctx.external_round_id().to_string();
        let round = self
            .rounds
            .find_by_session_and_ext_id(session_id, &external_round_id)
            .await?
            .ok_or_else(|| SagaError::not_found("round", &external_round_id))?;
        ctx.set_round(round);
        Ok(StepOutcome::Continue)
    }
}
