//! Retry configuration of the spin sagas.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// One retry policy per saga.
///
/// Settle and rollback credit money back to the player and get a larger
/// retry budget than place and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaConfig {
    pub place: RetryPolicy,
    pub settle: RetryPolicy,
    pub rollback: RetryPolicy,
    pub end: RetryPolicy,
}

impl SagaConfig {
    /// Uses the same policy for every saga.
    pub fn uniform(policy: RetryPolicy) -> Self {
        Self {
            place: policy,
            settle: policy,
            rollback: policy,
            end: policy,
        }
    }

    /// Builds a config from the default policy and the settle/rollback attempt budget.
    pub fn from_parts(default: RetryPolicy, settle_max_attempts: u32) -> Self {
        let settle = RetryPolicy {
            max_attempts: settle_max_attempts.max(1),
            ..default
        };
        Self {
            place: default,
            settle,
            rollback: settle,
            end: default,
        }
    }

    /// No retries and no delays, for tests.
    pub fn no_retry() -> Self {
        Self::uniform(RetryPolicy::none())
    }

    /// Retries without sleeping, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::uniform(RetryPolicy::fixed(max_attempts, Duration::ZERO))
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self::from_parts(RetryPolicy::default(), 5)
    }
}
