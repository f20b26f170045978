//! Saga error types.

use domain::{DomainError, Money};
use ledger::LedgerError;
use thiserror::Error;

use crate::state::SagaState;

/// Classified failure of a saga step.
///
/// Only [`SagaError::ExternalService`] is transient and retried by the
/// orchestrator; every other variant aborts the saga immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaError {
    /// A round, spin, game or session could not be found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request is malformed or inconsistent.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The player cannot cover the bet.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Money, available: Money },

    /// The bet is above the player's current limit.
    #[error("Bet limit exceeded: bet {amount}, limit {limit}")]
    BetLimitExceeded { amount: Money, limit: Money },

    /// The operation is not allowed in the current state (e.g. finished round).
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The wallet, storage or message bus failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// A conflicting record already exists.
    #[error("Duplicate {0}")]
    DuplicateEntity(String),
}

impl SagaError {
    /// Creates a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        SagaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if retrying the same step may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SagaError::ExternalService(_))
    }

    /// Stable snake_case code, used for metric labels and API error codes.
    pub fn code(&self) -> &'static str {
        match self {
            SagaError::NotFound { .. } => "not_found",
            SagaError::Validation(_) => "validation",
            SagaError::InsufficientBalance { .. } => "insufficient_balance",
            SagaError::BetLimitExceeded { .. } => "bet_limit_exceeded",
            SagaError::IllegalState(_) => "illegal_state",
            SagaError::ExternalService(_) => "external_service",
            SagaError::DuplicateEntity(_) => "duplicate_entity",
        }
    }
}

impl From<LedgerError> for SagaError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict { entity, key } => {
                SagaError::DuplicateEntity(format!("{entity}: {key}"))
            }
            LedgerError::RoundNotFound(id) => SagaError::not_found("round", id),
            // retrying cannot repair a stored row
            LedgerError::Corrupt(detail) => {
                SagaError::IllegalState(format!("corrupt record: {detail}"))
            }
            other => SagaError::ExternalService(other.to_string()),
        }
    }
}

impl From<DomainError> for SagaError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidAmount { .. } | DomainError::UnknownSpinType(_) => {
                SagaError::Validation(err.to_string())
            }
            DomainError::InvalidRollbackTarget(_) | DomainError::RoundFinished(_) => {
                SagaError::IllegalState(err.to_string())
            }
        }
    }
}

/// A compensation that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationFailure {
    pub step: &'static str,
    pub error: SagaError,
}

/// Caller-visible failure of a saga execution.
///
/// Carries the originating step error. `state` is `Compensated` when every
/// completed step was undone and `CompensationFailed` when at least one
/// compensation failed and the wallet needs manual reconciliation.
#[derive(Debug, Clone, Error)]
#[error("{saga} failed at step '{step}': {error}")]
pub struct SagaFailure {
    pub saga: &'static str,
    pub step: &'static str,
    #[source]
    pub error: SagaError,
    pub state: SagaState,
    pub compensation_failures: Vec<CompensationFailure>,
}

impl SagaFailure {
    /// The classification of the originating failure.
    pub fn kind(&self) -> &SagaError {
        &self.error
    }

    /// True if a compensation failed and the outcome must be reconciled by hand.
    pub fn requires_reconciliation(&self) -> bool {
        self.state == SagaState::CompensationFailed
    }

    /// Failure for a saga whose steps all succeeded but left no result behind.
    pub(crate) fn missing_result(saga: &'static str) -> Self {
        SagaFailure {
            saga,
            step: "result",
            error: SagaError::IllegalState("saga completed without a result".to_string()),
            state: SagaState::Succeeded,
            compensation_failures: Vec::new(),
        }
    }
}

/// Convenience type alias for saga step results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::RoundId;

    #[test]
    fn test_only_external_service_is_transient() {
        assert!(SagaError::ExternalService("timeout".into()).is_transient());
        assert!(!SagaError::Validation("bad".into()).is_transient());
        assert!(!SagaError::not_found("round", "r1").is_transient());
        assert!(!SagaError::IllegalState("finished".into()).is_transient());
        assert!(!SagaError::DuplicateEntity("spin".into()).is_transient());
    }

    #[test]
    fn test_ledger_errors_are_classified() {
        let conflict = LedgerError::Conflict {
            entity: "spin",
            key: "PLACE tx-1".into(),
        };
        assert!(matches!(
            SagaError::from(conflict),
            SagaError::DuplicateEntity(_)
        ));

        let missing = LedgerError::RoundNotFound(RoundId::new());
        assert!(matches!(
            SagaError::from(missing),
            SagaError::NotFound { entity: "round", .. }
        ));

        let corrupt = SagaError::from(LedgerError::Corrupt("bad row".into()));
        assert!(!corrupt.is_transient());
        assert_eq!(corrupt.code(), "illegal_state");
    }

    #[test]
    fn test_domain_errors_are_classified() {
        let invalid = DomainError::InvalidAmount {
            amount: Money::from_minor(-1),
            reason: "negative",
        };
        assert_eq!(SagaError::from(invalid).code(), "validation");

        let finished = DomainError::RoundFinished(RoundId::new());
        assert_eq!(SagaError::from(finished).code(), "illegal_state");
    }

    #[test]
    fn test_failure_display_names_step() {
        let failure = SagaFailure {
            saga: "place_spin",
            step: "wallet_withdraw",
            error: SagaError::ExternalService("wallet down".into()),
            state: SagaState::Compensated,
            compensation_failures: Vec::new(),
        };
        assert_eq!(
            failure.to_string(),
            "place_spin failed at step 'wallet_withdraw': External service error: wallet down"
        );
        assert!(!failure.requires_reconciliation());
    }
}
