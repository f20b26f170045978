//! Domain error types.

use common::RoundId;
use thiserror::Error;

use crate::money::Money;
use crate::spin::SpinType;

/// Errors raised when a domain invariant would be violated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The amount is not acceptable for the requested operation.
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Money, reason: &'static str },

    /// Only PLACE and SETTLE spins can be rolled back.
    #[error("A {0} spin cannot be rolled back")]
    InvalidRollbackTarget(SpinType),

    /// The round no longer accepts spins.
    #[error("Round {0} is already finished")]
    RoundFinished(RoundId),

    /// A persisted spin type could not be parsed.
    #[error("Unknown spin type: {0}")]
    UnknownSpinType(String),
}
