//! RollbackSpin: reverses an earlier bet or win.
//!
//! Steps: find round, find the original spin, refund through the wallet, save
//! the rollback spin, publish `spin.rolled_back`. Allowed on finished rounds.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Round, Session, Spin, SpinEvent, SpinType};
use ledger::{SpinRepository, SpinRepositoryExt};

use super::{
    FindRound, RoundScoped, publish, record_replay, required, save_spin, wallet_command,
};
use crate::context::{RollbackSpinContext, RollbackSpinRequest, SpinOutcome};
use crate::coordinator::Collaborators;
use crate::error::{Result, SagaError, SagaFailure};
use crate::orchestrator::Orchestrator;
use crate::retry::RetryPolicy;
use crate::services::{EventPublisher, WalletService};
use crate::step::{SagaStep, StepOutcome};

impl RoundScoped for RollbackSpinContext {
    fn session(&self) -> &Session {
        &self.request.session
    }

    fn external_round_id(&self) -> &str {
        &self.request.external_round_id
    }

    fn set_round(&mut self, round: Round) {
        self.round = Some(round);
    }
}

/// Saga handling an aggregator cancellation.
pub struct RollbackSpinSaga {
    orchestrator: Orchestrator<RollbackSpinContext>,
}

impl RollbackSpinSaga {
    pub const NAME: &'static str = "rollback_spin";

    pub fn new(collaborators: &Collaborators, retry: RetryPolicy) -> Self {
        let orchestrator = Orchestrator::new(Self::NAME, retry)
            .step(FindRound {
                rounds: collaborators.rounds.clone(),
            })
            .step(FindOriginalSpin {
                spins: collaborators.spins.clone(),
                wallet: collaborators.wallet.clone(),
            })
            .step(WalletRefund {
                wallet: collaborators.wallet.clone(),
            })
            .step(SaveRollbackSpin {
                spins: collaborators.spins.clone(),
            })
            .step(PublishRolledBack {
                events: collaborators.events.clone(),
            });
        Self { orchestrator }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.orchestrator.step_names()
    }

    /// Reverses the spin recorded under the request's transaction id.
    #[tracing::instrument(
        skip(self, request),
        fields(
            transaction_id = %request.transaction_id,
            external_round_id = %request.external_round_id
        )
    )]
    pub async fn execute(
        &self,
        request: RollbackSpinRequest,
    ) -> std::result::Result<SpinOutcome, SagaFailure> {
        let mut ctx = RollbackSpinContext::new(request);
        self.run(&mut ctx).await
    }

    /// Runs the saga against a caller-built context.
    pub async fn run(
        &self,
        ctx: &mut RollbackSpinContext,
    ) -> std::result::Result<SpinOutcome, SagaFailure> {
        self.orchestrator.run(ctx).await?;
        ctx.outcome()
            .ok_or_else(|| SagaFailure::missing_result(Self::NAME))
    }
}

/// Resolves the spin to reverse and detects replays.
///
/// When a bet and a win share the transaction id, the bet is reversed.
struct FindOriginalSpin {
    spins: Arc<dyn SpinRepository>,
    wallet: Arc<dyn WalletService>,
}

#[async_trait]
impl SagaStep<RollbackSpinContext> for FindOriginalSpin {
    fn name(&self) -> &'static str {
        "find_original_spin"
    }

    async fn execute(&self, ctx: &mut RollbackSpinContext) -> Result<StepOutcome> {
        let round_id = required(ctx.round.as_ref(), "round")?.id;
        let request = &ctx.request;

        let original = self
            .spins
            .find_all_by_round(round_id)
            .await?
            .into_iter()
            .filter(|s| {
                s.spin_type != SpinType::Rollback
                    && s.external_transaction_id == request.transaction_id
            })
            .min_by_key(|s| s.spin_type == SpinType::Settle)
            .ok_or_else(|| SagaError::not_found("spin", &request.transaction_id))?;

        if let Some(existing) = self.spins.find_rollback_of(round_id, &original).await? {
            let balance = self
                .wallet
                .balance(request.session.player_id, &request.session.currency)
                .await?;
            record_replay(RollbackSpinSaga::NAME, &existing);
            ctx.balance = Some(balance);
            ctx.spin = Some(existing);
            ctx.original = Some(original);
            ctx.replayed = true;
            return Ok(StepOutcome::Finish);
        }

        ctx.original = Some(original);
        Ok(StepOutcome::Continue)
    }
}

/// Reverses the original wallet movement.
///
/// The compensation re-applies the original movement under its own key, so a
/// retried cancellation finds the wallet exactly as before.
struct WalletRefund {
    wallet: Arc<dyn WalletService>,
}

#[async_trait]
impl SagaStep<RollbackSpinContext> for WalletRefund {
    fn name(&self) -> &'static str {
        "wallet_refund"
    }

    async fn execute(&self, ctx: &mut RollbackSpinContext) -> Result<StepOutcome> {
        let original = required(ctx.original.as_ref(), "original spin")?;
        let session = &ctx.request.session;

        // free spins never touched the wallet
        if original.split().is_zero() {
            let balance = self
                .wallet
                .balance(session.player_id, &session.currency)
                .await?;
            ctx.balance = Some(balance);
            return Ok(StepOutcome::Continue);
        }

        let key = required(ctx.original_wallet_key(), "original spin")?;
        let command = wallet_command(session, &key, original.split());
        let receipt = self.wallet.rollback(&command).await?;
        ctx.balance = Some(receipt.balance);
        ctx.flags.wallet_refunded = receipt.applied;
        Ok(StepOutcome::Continue)
    }

    async fn compensate(&self, ctx: &mut RollbackSpinContext) -> Result<()> {
        if !ctx.flags.wallet_refunded {
            return Ok(());
        }
        let key = required(ctx.original_wallet_key(), "original spin")?;
        let original = required(ctx.original.as_ref(), "original spin")?;
        let command = wallet_command(&ctx.request.session, &key, original.split());
        let receipt = match original.spin_type {
            SpinType::Place => self.wallet.withdraw(&command).await?,
            SpinType::Settle => self.wallet.deposit(&command).await?,
            SpinType::Rollback => return Ok(()),
        };
        tracing::info!(
            wallet_key = %command.transaction_id,
            original_type = %original.spin_type,
            "refund compensated"
        );
        ctx.balance = Some(receipt.balance);
        ctx.flags.wallet_refunded = false;
        Ok(())
    }
}

struct SaveRollbackSpin {
    spins: Arc<dyn SpinRepository>,
}

#[async_trait]
impl SagaStep<RollbackSpinContext> for SaveRollbackSpin {
    fn name(&self) -> &'static str {
        "save_spin"
    }

    async fn execute(&self, ctx: &mut RollbackSpinContext) -> Result<StepOutcome> {
        let original = required(ctx.original.as_ref(), "original spin")?;
        let spin = Spin::rollback(original, ctx.request.transaction_id.clone())?;

        let (spin, replayed) = save_spin(self.spins.as_ref(), spin).await?;
        ctx.spin = Some(spin);
        if replayed {
            ctx.replayed = true;
            return Ok(StepOutcome::Finish);
        }
        ctx.flags.spin_saved = true;
        Ok(StepOutcome::Continue)
    }
}

struct PublishRolledBack {
    events: Arc<dyn EventPublisher>,
}

#[async_trait]
impl SagaStep<RollbackSpinContext> for PublishRolledBack {
    fn name(&self) -> &'static str {
        "publish_event"
    }

    async fn execute(&self, ctx: &mut RollbackSpinContext) -> Result<StepOutcome> {
        let spin = required(ctx.spin.as_ref(), "spin")?;
        let event = SpinEvent::rolled_back(
            &ctx.correlation_id,
            &ctx.request.session,
            &ctx.request.external_round_id,
            spin,
        );
        ctx.flags.event_published =
            publish(self.events.as_ref(), RollbackSpinSaga::NAME, event).await;
        Ok(StepOutcome::Continue)
    }
}
