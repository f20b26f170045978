//! SettleSpin: records a win and credits the wallet.
//!
//! Steps: find round, find the bet, compute the win split, deposit, save spin,
//! finish the round when the win is final, publish `spin.settled`.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainError, Round, Session, Spin, SpinEvent, SpinType, proportional_split};
use ledger::{RoundRepository, SpinRepository, SpinRepositoryExt};

use super::{
    FindRound, RoundScoped, publish, record_replay, required, save_spin, wallet_command,
};
use crate::context::{SettleSpinContext, SettleSpinRequest, SpinOutcome};
use crate::coordinator::Collaborators;
use crate::error::{Result, SagaError, SagaFailure};
use crate::orchestrator::Orchestrator;
use crate::retry::RetryPolicy;
use crate::services::{EventPublisher, GameCatalog, WalletService};
use crate::step::{SagaStep, StepOutcome};

impl RoundScoped for SettleSpinContext {
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

/// Saga handling an aggregator win.
pub struct SettleSpinSaga {
    orchestrator: Orchestrator<SettleSpinContext>,
}

impl SettleSpinSaga {
    pub const NAME: &'static str = "settle_spin";

    pub fn new(collaborators: &Collaborators, retry: RetryPolicy) -> Self {
        let orchestrator = Orchestrator::new(Self::NAME, retry)
            .step(FindRound {
                rounds: collaborators.rounds.clone(),
            })
            .step(FindPlaceSpin {
                spins: collaborators.spins.clone(),
                wallet: collaborators.wallet.clone(),
            })
            .step(CalculateWinSplit {
                games: collaborators.games.clone(),
            })
            .step(WalletDeposit {
                wallet: collaborators.wallet.clone(),
            })
            .step(SaveSettleSpin {
                spins: collaborators.spins.clone(),
            })
            .step(FinishRound {
                rounds: collaborators.rounds.clone(),
            })
            .step(PublishSettled {
                events: collaborators.events.clone(),
            });
        Self { orchestrator }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.orchestrator.step_names()
    }

    /// Records a win.
    ///
    /// A losing spin (zero or negative win) moves no money and records
    /// nothing: it returns `Ok(None)` without touching any collaborator.
    #[tracing::instrument(
        skip(self, request),
        fields(
            transaction_id = %request.transaction_id,
            external_round_id = %request.external_round_id,
            amount = request.amount.minor()
        )
    )]
    pub async fn execute(
        &self,
        request: SettleSpinRequest,
    ) -> std::result::Result<Option<SpinOutcome>, SagaFailure> {
        if !request.amount.is_positive() {
            tracing::debug!("no win, nothing to settle");
            return Ok(None);
        }
        let mut ctx = SettleSpinContext::new(request);
        self.run(&mut ctx).await.map(Some)
    }

    /// Runs the saga against a caller-built context.
    pub async fn run(
        &self,
        ctx: &mut SettleSpinContext,
    ) -> std::result::Result<SpinOutcome, SagaFailure> {
        self.orchestrator.run(ctx).await?;
        ctx.outcome()
            .ok_or_else(|| SagaFailure::missing_result(Self::NAME))
    }
}

/// Detects replays and resolves the bet the win pays out.
struct FindPlaceSpin {
    spins: Arc<dyn SpinRepository>,
    wallet: Arc<dyn WalletService>,
}

#[async_trait]
impl SagaStep<SettleSpinContext> for FindPlaceSpin {
    fn name(&self) -> &'static str {
        "find_place_spin"
    }

    async fn execute(&self, ctx: &mut SettleSpinContext) -> Result<StepOutcome> {
        let round = required(ctx.round.as_ref(), "round")?;
        let request = &ctx.request;

        if let Some(existing) = self
            .spins
            .find_by_transaction(round.id, SpinType::Settle, &request.transaction_id)
            .await?
        {
            let balance = self
                .wallet
                .balance(request.session.player_id, &request.session.currency)
                .await?;
            record_replay(SettleSpinSaga::NAME, &existing);
            ctx.balance = Some(balance);
            ctx.spin = Some(existing);
            ctx.replayed = true;
            return Ok(StepOutcome::Finish);
        }

        if round.finished {
            return Err(DomainError::RoundFinished(round.id).into());
        }

        if let Some(other) = self
            .spins
            .find_by_round_and_type(round.id, SpinType::Settle)
            .await?
        {
            return Err(SagaError::DuplicateEntity(format!(
                "round {} already has win {}",
                round.external_round_id, other.external_transaction_id
            )));
        }

        let place = self
            .spins
            .find_by_round_and_type(round.id, SpinType::Place)
            .await?
            .ok_or_else(|| SagaError::not_found("bet", &round.external_round_id))?;

        if self.spins.find_rollback_of(round.id, &place).await?.is_some() {
            return Err(SagaError::IllegalState(format!(
                "bet {} was rolled back",
                place.external_transaction_id
            )));
        }

        ctx.place_spin = Some(place);
        Ok(StepOutcome::Continue)
    }
}

/// Splits the win in the same real/bonus proportion as the bet.
struct CalculateWinSplit {
    games: Arc<dyn GameCatalog>,
}

#[async_trait]
impl SagaStep<SettleSpinContext> for CalculateWinSplit {
    fn name(&self) -> &'static str {
        "calculate_win_split"
    }

    async fn execute(&self, ctx: &mut SettleSpinContext) -> Result<StepOutcome> {
        let amount = ctx.request.amount;
        let round = required(ctx.round.as_ref(), "round")?;
        let place = required(ctx.place_spin.as_ref(), "bet")?;
        let game = self
            .games
            .find_game(&round.game_id)
            .await?
            .ok_or_else(|| SagaError::not_found("game", &round.game_id))?;

        ctx.split = Some(proportional_split(
            amount,
            &place.split(),
            game.bonus_bet_enabled,
        ));
        Ok(StepOutcome::Continue)
    }
}

struct WalletDeposit {
    wallet: Arc<dyn WalletService>,
}

#[async_trait]
impl SagaStep<SettleSpinContext> for WalletDeposit {
    fn name(&self) -> &'static str {
        "wallet_deposit"
    }

    async fn execute(&self, ctx: &mut SettleSpinContext) -> Result<StepOutcome> {
        let split = required(ctx.split, "split")?;
        let command = wallet_command(&ctx.request.session, &ctx.wallet_key, split);
        let receipt = self.wallet.deposit(&command).await?;
        ctx.balance = Some(receipt.balance);
        ctx.flags.wallet_deposited = receipt.applied;
        Ok(StepOutcome::Continue)
    }

    async fn compensate(&self, ctx: &mut SettleSpinContext) -> Result<()> {
        if !ctx.flags.wallet_deposited {
            return Ok(());
        }
        let split = required(ctx.split, "split")?;
        let command = wallet_command(&ctx.request.session, &ctx.wallet_key, split);
        let receipt = self.wallet.rollback(&command).await?;
        tracing::info!(
            wallet_key = %command.transaction_id,
            amount = split.total().minor(),
            "win deposit compensated"
        );
        ctx.balance = Some(receipt.balance);
        ctx.flags.wallet_deposited = false;
        Ok(())
    }
}

struct SaveSettleSpin {
    spins: Arc<dyn SpinRepository>,
}

#[async_trait]
impl SagaStep<SettleSpinContext> for SaveSettleSpin {
    fn name(&self) -> &'static str {
        "save_spin"
    }

    async fn execute(&self, ctx: &mut SettleSpinContext) -> Result<StepOutcome> {
        let round_id = required(ctx.round.as_ref(), "round")?.id;
        let split = required(ctx.split, "split")?;
        let spin = Spin::settle(
            round_id,
            ctx.request.transaction_id.clone(),
            ctx.request.amount,
            split,
            ctx.request.free_spin_id.clone(),
        )?;

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

/// Closes the round when the aggregator marked the win as final.
///
/// The win is already paid and recorded at this point, so a storage failure
/// is logged and leaves the round open for the next end-round callback.
struct FinishRound {
    rounds: Arc<dyn RoundRepository>,
}

#[async_trait]
impl SagaStep<SettleSpinContext> for FinishRound {
    fn name(&self) -> &'static str {
        "finish_round"
    }

    async fn execute(&self, ctx: &mut SettleSpinContext) -> Result<StepOutcome> {
        if !ctx.request.finish_round {
            return Ok(StepOutcome::Continue);
        }
        let round_id = required(ctx.round.as_ref(), "round")?.id;

        match self.rounds.finish(round_id).await {
            Ok(round) => {
                ctx.round = Some(round);
                ctx.flags.round_finished = true;
            }
            Err(error) => {
                tracing::warn!(%round_id, %error, "failed to finish round after win");
            }
        }
        Ok(StepOutcome::Continue)
    }
}

struct PublishSettled {
    events: Arc<dyn EventPublisher>,
}

#[async_trait]
impl SagaStep<SettleSpinContext> for PublishSettled {
    fn name(&self) -> &'static str {
        "publish_event"
    }

    async fn execute(&self, ctx: &mut SettleSpinContext) -> Result<StepOutcome> {
        let round = required(ctx.round.as_ref(), "round")?;
        let spin = required(ctx.spin.as_ref(), "spin")?;
        let settled = SpinEvent::settled(&ctx.correlation_id, &ctx.request.session, round, spin);
        let ended = ctx
            .flags
            .round_finished
            .then(|| SpinEvent::round_ended(&ctx.correlation_id, &ctx.request.session, round));

        let mut published = publish(self.events.as_ref(), SettleSpinSaga::NAME, settled).await;
        if let Some(ended) = ended {
            published &= publish(self.events.as_ref(), SettleSpinSaga::NAME, ended).await;
        }
        ctx.flags.event_published = published;
        Ok(StepOutcome::Continue)
    }
}
