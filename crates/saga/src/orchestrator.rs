//! Generic saga orchestrator: ordered steps, retry, reverse compensation.

use std::time::Instant;

use crate::error::{CompensationFailure, SagaError, SagaFailure};
use crate::retry::RetryPolicy;
use crate::state::SagaState;
use crate::step::{SagaContext, SagaStep, StepOutcome};

/// Summary of a successful saga execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaReport {
    pub saga: &'static str,
    pub state: SagaState,
    /// Names of the steps that ran, in execution order.
    pub completed_steps: Vec<&'static str>,
    /// Step executions including retries.
    pub attempts: u32,
    /// True if a step ended the saga early.
    pub short_circuited: bool,
}

/// Runs a fixed list of steps against a context.
///
/// Steps execute strictly in order. Transient failures are retried under the
/// saga's [`RetryPolicy`]; any other failure (or exhausted retries) triggers
/// compensation of the already completed steps in reverse order. Compensation
/// failures are collected on the returned [`SagaFailure`] instead of replacing
/// the original error.
pub struct Orchestrator<C: SagaContext> {
    saga: &'static str,
    steps: Vec<Box<dyn SagaStep<C>>>,
    retry: RetryPolicy,
}

impl<C: SagaContext> Orchestrator<C> {
    /// Creates an orchestrator with no steps.
    pub fn new(saga: &'static str, retry: RetryPolicy) -> Self {
        Self {
            saga,
            steps: Vec::new(),
            retry,
        }
    }

    /// Appends a step to the pipeline.
    pub fn step(mut self, step: impl SagaStep<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// The saga name.
    pub fn name(&self) -> &'static str {
        self.saga
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// The retry policy applied to each step.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Executes the saga against `ctx`.
    #[tracing::instrument(
        skip(self, ctx),
        fields(saga = self.saga, correlation_id = %ctx.correlation_id())
    )]
    pub async fn run(&self, ctx: &mut C) -> Result<SagaReport, SagaFailure> {
        metrics::counter!("saga_executions_total", "saga" => self.saga).increment(1);
        let started = Instant::now();

        let mut state = SagaState::Pending;
        self.advance(ctx, &mut state, SagaState::Running)
            .map_err(|error| self.rejected(error, state))?;

        let mut completed: Vec<usize> = Vec::with_capacity(self.steps.len());
        let mut attempts = 0u32;
        let mut short_circuited = false;

        for (index, step) in self.steps.iter().enumerate() {
            tracing::debug!(step = step.name(), "saga step started");
            match self.execute_step(step.as_ref(), ctx, &mut attempts).await {
                Ok(StepOutcome::Continue) => completed.push(index),
                Ok(StepOutcome::Finish) => {
                    completed.push(index);
                    short_circuited = true;
                    tracing::info!(step = step.name(), "saga finished early");
                    break;
                }
                Err(error) => {
                    let failure = self
                        .compensate(ctx, state, &completed, step.name(), error)
                        .await;
                    metrics::counter!(
                        "saga_failed_total",
                        "saga" => self.saga,
                        "step" => failure.step,
                        "kind" => failure.error.code()
                    )
                    .increment(1);
                    metrics::histogram!("saga_duration_seconds", "saga" => self.saga)
                        .record(started.elapsed().as_secs_f64());
                    return Err(failure);
                }
            }
        }

        self.advance(ctx, &mut state, SagaState::Succeeded)
            .map_err(|error| self.rejected(error, state))?;
        metrics::counter!("saga_completed_total", "saga" => self.saga).increment(1);
        metrics::histogram!("saga_duration_seconds", "saga" => self.saga)
            .record(started.elapsed().as_secs_f64());
        tracing::info!(attempts, short_circuited, "saga succeeded");

        Ok(SagaReport {
            saga: self.saga,
            state,
            completed_steps: completed.iter().map(|&i| self.steps[i].name()).collect(),
            attempts,
            short_circuited,
        })
    }

    fn advance(
        &self,
        ctx: &mut C,
        state: &mut SagaState,
        next: SagaState,
    ) -> Result<(), SagaError> {
        let from = *state;
        state.transition(next)?;
        tracing::debug!(%from, to = %next, "saga state changed");
        ctx.record_state(next);
        Ok(())
    }

    fn rejected(&self, error: SagaError, state: SagaState) -> SagaFailure {
        tracing::error!(%error, %state, "saga lifecycle violated");
        SagaFailure {
            saga: self.saga,
            step: "lifecycle",
            error,
            state,
            compensation_failures: Vec::new(),
        }
    }

    async fn execute_step(
        &self,
        step: &dyn SagaStep<C>,
        ctx: &mut C,
        attempts: &mut u32,
    ) -> Result<StepOutcome, SagaError> {
        let mut attempt = 1;
        loop {
            *attempts += 1;
            match step.execute(ctx).await {
                Ok(outcome) => return Ok(outcome),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        step = step.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient step failure, retrying"
                    );
                    metrics::counter!(
                        "saga_step_retries_total",
                        "saga" => self.saga,
                        "step" => step.name()
                    )
                    .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn compensate(
        &self,
        ctx: &mut C,
        mut state: SagaState,
        completed: &[usize],
        failed_step: &'static str,
        error: SagaError,
    ) -> SagaFailure {
        tracing::warn!(
            step = failed_step,
            %error,
            completed = completed.len(),
            "saga step failed, compensating"
        );
        if let Err(lifecycle) = self.advance(ctx, &mut state, SagaState::Compensating) {
            return self.rejected(lifecycle, state);
        }

        let mut failures = Vec::new();
        for &index in completed.iter().rev() {
            let step = self.steps[index].as_ref();
            if let Err(compensation_error) = self.compensate_step(step, ctx).await {
                tracing::error!(
                    step = step.name(),
                    error = %compensation_error,
                    "compensation failed, manual reconciliation required"
                );
                metrics::counter!(
                    "saga_compensation_failed_total",
                    "saga" => self.saga,
                    "step" => step.name()
                )
                .increment(1);
                failures.push(CompensationFailure {
                    step: step.name(),
                    error: compensation_error,
                });
            }
        }

        let next = if failures.is_empty() {
            SagaState::Compensated
        } else {
            SagaState::CompensationFailed
        };
        if let Err(lifecycle) = self.advance(ctx, &mut state, next) {
            return self.rejected(lifecycle, state);
        }
        tracing::info!(state = %state, "saga compensation finished");

        SagaFailure {
            saga: self.saga,
            step: failed_step,
            error,
            state,
            compensation_failures: failures,
        }
    }

    async fn compensate_step(&self, step: &dyn SagaStep<C>, ctx: &mut C) -> Result<(), SagaError> {
        let mut attempt = 1;
        loop {
            match step.compensate(ctx).await {
                Ok(()) => return Ok(()),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
