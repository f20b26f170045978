//! The saga step abstraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::state::SagaState;

/// Scratch state threaded through the steps of one saga execution.
pub trait SagaContext: Send + 'static {
    /// Identifier threading this execution through logs, wallet calls and events.
    fn correlation_id(&self) -> &str;

    /// Called by the orchestrator on every lifecycle transition.
    fn record_state(&mut self, _state: SagaState) {}
}

/// What the orchestrator does after a step succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Run the next step.
    Continue,
    /// End the saga successfully without running the remaining steps.
    Finish,
}

/// A unit of forward work plus its compensating action.
///
/// Steps only observe and mutate the context and call external
/// collaborators; they never call back into the orchestrator.
#[async_trait]
pub trait SagaStep<C: SagaContext>: Send + Sync {
    /// Stable step name used in logs, metrics and failures.
    fn name(&self) -> &'static str;

    /// Performs the forward work.
    async fn execute(&self, ctx: &mut C) -> Result<StepOutcome>;

    /// Best-effort inverse of [`SagaStep::execute`].
    ///
    /// Must check the context's completion flags before acting, so calling it
    /// after a partial or missing `execute` is harmless.
    async fn compensate(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }
}
