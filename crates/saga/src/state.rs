//! Lifecycle of one saga execution.

use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Where a saga execution stands.
///
/// ```text
/// Pending ──► Running ──┬──► Succeeded
///                       └──► Compensating ──┬──► Compensated
///                                           └──► CompensationFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    Pending,
    Running,
    Succeeded,
    /// A step failed; completed steps are being undone.
    Compensating,
    Compensated,
    /// Some compensation failed; the wallet and ledger need reconciliation.
    CompensationFailed,
}

impl SagaState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Succeeded | SagaState::Compensated | SagaState::CompensationFailed
        )
    }

    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Succeeded)
                | (Running, Compensating)
                | (Compensating, Compensated)
                | (Compensating, CompensationFailed)
        )
    }

    /// Moves to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: SagaState) -> Result<(), SagaError> {
        if self.is_terminal() || !self.can_transition_to(next) {
            return Err(SagaError::IllegalState(format!(
                "saga cannot move from {self} to {next}"
            )));
        }
        *self = next;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Pending => "pending",
            SagaState::Running => "running",
            SagaState::Succeeded => "succeeded",
            SagaState::Compensating => "compensating",
            SagaState::Compensated => "compensated",
            SagaState::CompensationFailed => "compensation_failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = SagaState::default();
        state.transition(SagaState::Running).unwrap();
        state.transition(SagaState::Succeeded).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failure_path() {
        let mut state = SagaState::Running;
        state.transition(SagaState::Compensating).unwrap();
        assert!(!state.is_terminal());
        state.transition(SagaState::CompensationFailed).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_illegal_transitions_leave_state_unchanged() {
        let mut state = SagaState::Pending;
        assert!(matches!(
            state.transition(SagaState::Compensating),
            Err(SagaError::IllegalState(_))
        ));
        assert_eq!(state, SagaState::Pending);

        let mut done = SagaState::Compensated;
        assert!(done.transition(SagaState::Running).is_err());
        assert!(!SagaState::Succeeded.can_transition_to(SagaState::Compensating));
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaState::CompensationFailed.to_string(), "compensation_failed");
        assert_eq!(
            serde_json::to_string(&SagaState::Compensating).unwrap(),
            "\"Compensating\""
        );
    }
}
