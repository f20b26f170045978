//! PlaceSpin: records a bet and debits the wallet.
//!
//! Steps: validate game, find or create round, validate balance, withdraw,
//! save spin, publish `spin.placed`.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainError, Spin, SpinEvent, SpinType, Split, withdrawal_split};
use ledger::{RoundRepository, SpinRepository, SpinRepositoryExt};

use super::{publish, record_replay, required, save_spin, wallet_command};
use crate::context::{PlaceSpinContext, PlaceSpinRequest, SpinOutcome};
use crate::coordinator::Collaborators;
use crate::error::{Result, SagaError, SagaFailure};
use crate::orchestrator::Orchestrator;
use crate::retry::RetryPolicy;
use crate::services::{
    EventPublisher, GameCatalog, MovementDirection, PlayerLimitService, WalletService,
};
use crate::step::{SagaStep, StepOutcome};

/// Saga handling an aggregator bet.
pub struct PlaceSpinSaga {
    orchestrator: Orchestrator<PlaceSpinContext>,
}

impl PlaceSpinSaga {
    pub const NAME: &'static str = "place_spin";

    pub fn new(collaborators: &Collaborators, retry: RetryPolicy) -> Self {
        let orchestrator = Orchestrator::new(Self::NAME, retry)
            .step(ValidateGame {
                games: collaborators.games.clone(),
            })
            .step(FindOrCreateRound {
                rounds: collaborators.rounds.clone(),
                spins: collaborators.spins.clone(),
                wallet: collaborators.wallet.clone(),
            })
            .step(ValidateBalance {
                wallet: collaborators.wallet.clone(),
                limits: collaborators.limits.clone(),
            })
            .step(WalletWithdraw {
                wallet: collaborators.wallet.clone(),
            })
            .step(SavePlaceSpin {
                spins: collaborators.spins.clone(),
            })
            .step(PublishPlaced {
                events: collaborators.events.clone(),
            });
        Self { orchestrator }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.orchestrator.step_names()
    }

    /// Records a bet.
    #[tracing::instrument(
        skip(self, request),
        fields(
            transaction_id = %request.transaction_id,
            external_round_id = %request.external_round_id,
            amount = request.amount.minor()
        )
    )]
    pub async fn execute(&self, request: PlaceSpinRequest) -> std::result::Result<SpinOutcome, SagaFailure> {
        let mut ctx = PlaceSpinContext::new(request);
        self.run(&mut ctx).await
    }

    /// Runs the saga against a caller-built context.
    pub async fn run(
        &self,
        ctx: &mut PlaceSpinContext,
    ) -> std::result::Result<SpinOutcome, SagaFailure> {
        self.orchestrator.run(ctx).await?;
        ctx.outcome()
            .ok_or_else(|| SagaFailure::missing_result(Self::NAME))
    }
}

struct ValidateGame {
    games: Arc<dyn GameCatalog>,
}

#[async_trait]
impl SagaStep<PlaceSpinContext> for ValidateGame {
    fn name(&self) -> &'static str {
        "validate_game"
    }

    async fn execute(&self, ctx: &mut PlaceSpinContext) -> Result<StepOutcome> {
        let request = &ctx.request;
        if request.amount.is_negative() {
            return Err(SagaError::Validation(format!(
                "bet amount {} must not be negative",
                request.amount
            )));
        }
        if request.game_id != request.session.game_id {
            return Err(SagaError::Validation(format!(
                "game {} does not belong to session {}",
                request.game_id, request.session.id
            )));
        }

        let game = self
            .games
            .find_game(&request.game_id)
            .await?
            .ok_or_else(|| SagaError::not_found("game", &request.game_id))?;
        if !game.active {
            return Err(SagaError::IllegalState(format!(
                "game {} is not active",
                game.id
            )));
        }

        ctx.game = Some(game);
        Ok(StepOutcome::Continue)
    }
}

/// Resolves the round and detects replays of the same bet.
///
/// Rounds are never deleted, so there is nothing to compensate.
struct FindOrCreateRound {
    rounds: Arc<dyn RoundRepository>,
    spins: Arc<dyn SpinRepository>,
    wallet: Arc<dyn WalletService>,
}

#[async_trait]
impl SagaStep<PlaceSpinContext> for FindOrCreateRound {
    fn name(&self) -> &'static str {
        "find_or_create_round"
    }

    async fn execute(&self, ctx: &mut PlaceSpinContext) -> Result<StepOutcome> {
        let request = &ctx.request;
        let lookup = self
            .rounds
            .find_or_create(
                request.session.id,
                &request.game_id,
                &request.external_round_id,
            )
            .await?;
        let round = lookup.round;

        if !lookup.created {
            if let Some(existing) = self
                .spins
                .find_by_transaction(round.id, SpinType::Place, &request.transaction_id)
                .await?
            {
                let balance = self
                    .wallet
                    .balance(request.session.player_id, &request.session.currency)
                    .await?;
                record_replay(PlaceSpinSaga::NAME, &existing);
                ctx.balance = Some(balance);
                ctx.spin = Some(existing);
                ctx.round = Some(round);
                ctx.replayed = true;
                return Ok(StepOutcome::Finish);
            }

            if round.finished {
                return Err(DomainError::RoundFinished(round.id).into());
            }

            if let Some(other) = self
                .spins
                .find_by_round_and_type(round.id, SpinType::Place)
                .await?
            {
                return Err(SagaError::DuplicateEntity(format!(
                    "round {} already has bet {}",
                    round.external_round_id, other.external_transaction_id
                )));
            }
        }

        ctx.flags.round_created = lookup.created;
        ctx.round = Some(round);
        Ok(StepOutcome::Continue)
    }
}

/// Checks the bet limit and computes the real/bonus split of the bet.
struct ValidateBalance {
    wallet: Arc<dyn WalletService>,
    limits: Arc<dyn PlayerLimitService>,
}

#[async_trait]
impl SagaStep<PlaceSpinContext> for ValidateBalance {
    fn name(&self) -> &'static str {
        "validate_balance"
    }

    async fn execute(&self, ctx: &mut PlaceSpinContext) -> Result<StepOutcome> {
        let session = &ctx.request.session;
        let amount = ctx.request.amount;

        // free spins are funded by the aggregator
        if ctx.is_free_spin() {
            let balance = self
                .wallet
                .balance(session.player_id, &session.currency)
                .await?;
            ctx.balance = Some(balance);
            ctx.split = Some(Split::zero());
            return Ok(StepOutcome::Continue);
        }

        // a debit left behind by an execution that failed before saving the
        // spin is adopted as is, not checked against the current funds again
        if let Some(movement) = self.wallet.find_movement(&ctx.wallet_key).await? {
            if movement.player_id != session.player_id
                || movement.direction != MovementDirection::Debit
            {
                return Err(SagaError::DuplicateEntity(format!(
                    "wallet transaction {}",
                    ctx.wallet_key
                )));
            }
            if movement.split.total() != amount {
                return Err(SagaError::Validation(format!(
                    "bet {} was already debited with amount {}",
                    ctx.request.transaction_id,
                    movement.split.total()
                )));
            }
            tracing::info!(
                wallet_key = %ctx.wallet_key,
                amount = amount.minor(),
                "adopting earlier debit of an unrecorded bet"
            );
            let balance = self
                .wallet
                .balance(session.player_id, &session.currency)
                .await?;
            ctx.balance = Some(balance);
            ctx.split = Some(movement.split);
            return Ok(StepOutcome::Continue);
        }

        if let Some(limit) = self
            .limits
            .find_current_bet_limit(session.player_id)
            .await?
            && amount > limit
        {
            return Err(SagaError::BetLimitExceeded { amount, limit });
        }

        let balance = self
            .wallet
            .balance(session.player_id, &session.currency)
            .await?;
        let bonus_enabled = ctx.game.as_ref().is_some_and(|g| g.bonus_bet_enabled);
        let split = withdrawal_split(amount, &balance, bonus_enabled);

        if !balance.covers(&split) {
            let available = if bonus_enabled {
                balance.total()
            } else {
                balance.real
            };
            return Err(SagaError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        ctx.balance = Some(balance);
        ctx.split = Some(split);
        Ok(StepOutcome::Continue)
    }
}

struct WalletWithdraw {
    wallet: Arc<dyn WalletService>,
}

#[async_trait]
impl SagaStep<PlaceSpinContext> for WalletWithdraw {
    fn name(&self) -> &'static str {
        "wallet_withdraw"
    }

    async fn execute(&self, ctx: &mut PlaceSpinContext) -> Result<StepOutcome> {
        let split = required(ctx.split, "split")?;
        if split.is_zero() {
            return Ok(StepOutcome::Continue);
        }

        let command = wallet_command(&ctx.request.session, &ctx.wallet_key, split);
        let receipt = self.wallet.withdraw(&command).await?;
        ctx.balance = Some(receipt.balance);
        ctx.flags.wallet_withdrawn = receipt.applied;
        Ok(StepOutcome::Continue)
    }

    async fn compensate(&self, ctx: &mut PlaceSpinContext) -> Result<()> {
        if !ctx.flags.wallet_withdrawn {
            return Ok(());
        }
        let split = required(ctx.split, "split")?;
        let command = wallet_command(&ctx.request.session, &ctx.wallet_key, split);
        let receipt = self.wallet.rollback(&command).await?;
        tracing::info!(
            wallet_key = %command.transaction_id,
            amount = split.total().minor(),
            "bet withdrawal compensated"
        );
        ctx.balance = Some(receipt.balance);
        ctx.flags.wallet_withdrawn = false;
        Ok(())
    }
}

struct SavePlaceSpin {
    spins: Arc<dyn SpinRepository>,
}

#[async_trait]
impl SagaStep<PlaceSpinContext> for SavePlaceSpin {
    fn name(&self) -> &'static str {
        "save_spin"
    }

    async fn execute(&self, ctx: &mut PlaceSpinContext) -> Result<StepOutcome> {
        let round_id = required(ctx.round.as_ref(), "round")?.id;
        let split = required(ctx.split, "split")?;
        let spin = Spin::place(
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

struct PublishPlaced {
    events: Arc<dyn EventPublisher>,
}

#[async_trait]
impl SagaStep<PlaceSpinContext> for PublishPlaced {
    fn name(&self) -> &'static str {
        "publish_event"
    }

    async fn execute(&self, ctx: &mut PlaceSpinContext) -> Result<StepOutcome> {
        let round = required(ctx.round.as_ref(), "round")?;
        let spin = required(ctx.spin.as_ref(), "spin")?;
        let event = SpinEvent::placed(&ctx.correlation_id, &ctx.request.session, round, spin);
        ctx.flags.event_published = publish(self.events.as_ref(), PlaceSpinSaga::NAME, event).await;
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SagaState;
    use crate::test_support::Fixture;
    use domain::{Balance, Money};

    #[tokio::test]
    async fn test_steps_run_in_documented_order() {
        let fixture = Fixture::new();
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());
        assert_eq!(
            saga.step_names(),
            vec![
                "validate_game",
                "find_or_create_round",
                "validate_balance",
                "wallet_withdraw",
                "save_spin",
                "publish_event"
            ]
        );
    }

    #[tokio::test]
    async fn test_place_debits_and_records() {
        let fixture = Fixture::new();
        fixture.fund(10_000, 0);
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());

        let outcome = saga.execute(fixture.place("r1", "tx-1", 500)).await.unwrap();

        assert!(!outcome.replayed);
        assert_eq!(outcome.spin.amount, Money::from_minor(500));
        assert_eq!(outcome.balance.real, Money::from_minor(9_500));
        assert_eq!(fixture.ledger.spin_count().await, 1);
        assert_eq!(fixture.events.event_types(), vec!["spin.placed"]);
    }

    #[tokio::test]
    async fn test_context_tracks_saga_state() {
        let fixture = Fixture::new();
        fixture.fund(100, 0);
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());

        let mut ok = PlaceSpinContext::new(fixture.place("r1", "tx-1", 100));
        saga.run(&mut ok).await.unwrap();
        assert_eq!(ok.state(), SagaState::Succeeded);

        let mut broke = PlaceSpinContext::new(fixture.place("r2", "tx-2", 100));
        saga.run(&mut broke).await.unwrap_err();
        assert_eq!(broke.state(), SagaState::Compensated);
    }

    #[tokio::test]
    async fn test_bet_draws_real_before_bonus() {
        let fixture = Fixture::with_bonus_bets();
        fixture.fund(300, 1_000);
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());

        let outcome = saga.execute(fixture.place("r1", "tx-1", 500)).await.unwrap();

        assert_eq!(outcome.spin.real_amount, Money::from_minor(300));
        assert_eq!(outcome.spin.bonus_amount, Money::from_minor(200));
        assert_eq!(
            outcome.balance,
            Balance::new(Money::zero(), Money::from_minor(800))
        );
    }

    #[tokio::test]
    async fn test_bonus_disabled_requires_real_funds() {
        let fixture = Fixture::new();
        fixture.fund(300, 1_000);
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());

        let failure = saga
            .execute(fixture.place("r1", "tx-1", 500))
            .await
            .unwrap_err();

        assert_eq!(failure.step, "validate_balance");
        assert_eq!(
            failure.error,
            SagaError::InsufficientBalance {
                requested: Money::from_minor(500),
                available: Money::from_minor(300),
            }
        );
        assert_eq!(fixture.ledger.spin_count().await, 0);
    }

    #[tokio::test]
    async fn test_bet_limit_is_enforced() {
        let fixture = Fixture::new();
        fixture.fund(10_000, 0);
        fixture
            .limits
            .set_bet_limit(fixture.session.player_id, Money::from_minor(100));
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());

        let failure = saga
            .execute(fixture.place("r1", "tx-1", 500))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SagaError::BetLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_free_spin_skips_wallet() {
        let fixture = Fixture::new();
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());
        let mut request = fixture.place("r1", "tx-1", 500);
        request.free_spin_id = Some("fs-1".into());

        let outcome = saga.execute(request).await.unwrap();

        assert!(outcome.spin.split().is_zero());
        assert_eq!(outcome.spin.free_spin_id.as_deref(), Some("fs-1"));
        assert_eq!(
            fixture
                .wallet
                .calls(crate::services::WalletOperation::Withdraw),
            0
        );
    }

    #[tokio::test]
    async fn test_inactive_game_is_rejected() {
        let fixture = Fixture::new();
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());
        fixture.games.upsert(domain::Game::new("g-1", "Gone", "onegamehub").with_active(false));

        let failure = saga
            .execute(fixture.place("r1", "tx-1", 100))
            .await
            .unwrap_err();

        assert_eq!(failure.step, "validate_game");
        assert!(matches!(failure.error, SagaError::IllegalState(_)));
    }

    #[tokio::test]
    async fn test_negative_amount_is_rejected() {
        let fixture = Fixture::new();
        let saga = PlaceSpinSaga::new(&fixture.collaborators(), RetryPolicy::none());

        let failure = saga
            .execute(fixture.place("r1", "tx-1", -1))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SagaError::Validation(_)));
        assert_eq!(fixture.ledger.round_count().await, 0);
    }
}
