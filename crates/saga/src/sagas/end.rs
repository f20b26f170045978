//! EndRound: marks a round finished and publishes `round.ended` once.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Round, Session, SpinEvent};
use ledger::RoundRepository;

use super::{FindRound, RoundScoped, publish, required};
use crate::context::{EndRoundContext, EndRoundRequest, RoundOutcome};
use crate::coordinator::Collaborators;
use crate::error::{Result, SagaFailure};
use crate::orchestrator::Orchestrator;
use crate::retry::RetryPolicy;
use crate::services::EventPublisher;
use crate::step::{SagaStep, StepOutcome};

impl RoundScoped for EndRoundContext {
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

/// Saga handling the aggregator's end-of-round notice.
pub struct EndRoundSaga {
    orchestrator: Orchestrator<EndRoundContext>,
}

impl EndRoundSaga {
    pub const NAME: &'static str = "end_round";

    pub fn new(collaborators: &Collaborators, retry: RetryPolicy) -> Self {
        let orchestrator = Orchestrator::new(Self::NAME, retry)
            .step(FindRound {
                rounds: collaborators.rounds.clone(),
            })
            .step(CloseRound {
                rounds: collaborators.rounds.clone(),
            })
            .step(PublishEnded {
                events: collaborators.events.clone(),
            });
        Self { orchestrator }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.orchestrator.step_names()
    }

    /// Finishes the round. Ending a finished round is a no-op.
    #[tracing::instrument(skip(self, request), fields(external_round_id = %request.external_round_id))]
    pub async fn execute(
        &self,
        request: EndRoundRequest,
    ) -> std::result::Result<RoundOutcome, SagaFailure> {
        let mut ctx = EndRoundContext::new(request);
        self.orchestrator.run(&mut ctx).await?;
        ctx.outcome()
            .ok_or_else(|| SagaFailure::missing_result(Self::NAME))
    }
}

struct CloseRound {
    rounds: Arc<dyn RoundRepository>,
}

#[async_trait]
impl SagaStep<EndRoundContext> for CloseRound {
    fn name(&self) -> &'static str {
        "close_round"
    }

    async fn execute(&self, ctx: &mut EndRoundContext) -> Result<StepOutcome> {
        let round = required(ctx.round.as_ref(), "round")?;
        if round.finished {
            tracing::debug!(round_id = %round.id, "round already finished");
            return Ok(StepOutcome::Continue);
        }

        let finished = self.rounds.finish(round.id).await?;
        ctx.round = Some(finished);
        ctx.newly_finished = true;
        Ok(StepOutcome::Continue)
    }
}

struct PublishEnded {
    events: Arc<dyn EventPublisher>,
}

#[async_trait]
impl SagaStep<EndRoundContext> for PublishEnded {
    fn name(&self) -> &'static str {
        "publish_event"
    }

    async fn execute(&self, ctx: &mut EndRoundContext) -> Result<StepOutcome> {
        if !ctx.newly_finished {
            return Ok(StepOutcome::Continue);
        }
        let round = required(ctx.round.as_ref(), "round")?;
        let event = SpinEvent::round_ended(&ctx.correlation_id, &ctx.request.session, round);
        ctx.event_published = publish(self.events.as_ref(), EndRoundSaga::NAME, event).await;
        Ok(StepOutcome::Continue)
    }
}
