//! Spin record: one monetary event within a round.

use chrono::{DateTime, Utc};
use common::{RoundId, SpinId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::{Money, Split};

/// The kind of monetary event a spin records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpinType {
    /// A bet: money leaves the player's wallet.
    Place,
    /// A win: money is paid to the player.
    Settle,
    /// A reversal of an earlier PLACE or SETTLE.
    Rollback,
}

impl SpinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpinType::Place => "PLACE",
            SpinType::Settle => "SETTLE",
            SpinType::Rollback => "ROLLBACK",
        }
    }
}

impl std::fmt::Display for SpinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SpinType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLACE" => Ok(SpinType::Place),
            "SETTLE" => Ok(SpinType::Settle),
            "ROLLBACK" => Ok(SpinType::Rollback),
            other => Err(DomainError::UnknownSpinType(other.to_string())),
        }
    }
}

/// An immutable spin record.
///
/// Corrections never update a spin; they insert a new spin of a different
/// type that references the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spin {
    pub id: SpinId,
    /// `None` only for a rollback whose round could not be resolved.
    pub round_id: Option<RoundId>,
    pub spin_type: SpinType,
    /// Aggregator transaction id, the idempotency key of the callback.
    pub external_transaction_id: String,
    pub amount: Money,
    pub real_amount: Money,
    pub bonus_amount: Money,
    pub free_spin_id: Option<String>,
    /// For ROLLBACK spins, the spin being reversed.
    pub reference_id: Option<SpinId>,
    pub created_at: DateTime<Utc>,
}

impl Spin {
    /// Records a bet.
    pub fn place(
        round_id: RoundId,
        external_transaction_id: impl Into<String>,
        amount: Money,
        split: Split,
        free_spin_id: Option<String>,
    ) -> Result<Self, DomainError> {
        if amount.is_negative() {
            return Err(DomainError::InvalidAmount {
                amount,
                reason: "bet amount must not be negative",
            });
        }
        Ok(Self::new(
            Some(round_id),
            SpinType::Place,
            external_transaction_id.into(),
            amount,
            split,
            free_spin_id,
            None,
        ))
    }

    /// Records a win.
    pub fn settle(
        round_id: RoundId,
        external_transaction_id: impl Into<String>,
        amount: Money,
        split: Split,
        free_spin_id: Option<String>,
    ) -> Result<Self, DomainError> {
        if !amount.is_positive() {
            return Err(DomainError::InvalidAmount {
                amount,
                reason: "win amount must be positive",
            });
        }
        Ok(Self::new(
            Some(round_id),
            SpinType::Settle,
            external_transaction_id.into(),
            amount,
            split,
            free_spin_id,
            None,
        ))
    }

    /// Records the reversal of `original`, mirroring its amount and split.
    pub fn rollback(
        original: &Spin,
        external_transaction_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if original.spin_type == SpinType::Rollback {
            return Err(DomainError::InvalidRollbackTarget(original.spin_type));
        }
        Ok(Self::new(
            original.round_id,
            SpinType::Rollback,
            external_transaction_id.into(),
            original.amount,
            original.split(),
            original.free_spin_id.clone(),
            Some(original.id),
        ))
    }

    fn new(
        round_id: Option<RoundId>,
        spin_type: SpinType,
        external_transaction_id: String,
        amount: Money,
        split: Split,
        free_spin_id: Option<String>,
        reference_id: Option<SpinId>,
    ) -> Self {
        Self {
            id: SpinId::new(),
            round_id,
            spin_type,
            external_transaction_id,
            amount,
            real_amount: split.real,
            bonus_amount: split.bonus,
            free_spin_id,
            reference_id,
            created_at: Utc::now(),
        }
    }

    /// The real/bonus split this spin moved.
    pub fn split(&self) -> Split {
        Split::new(self.real_amount, self.bonus_amount)
    }

    pub fn is_free_spin(&self) -> bool {
        self.free_spin_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place_spin() -> Spin {
        Spin::place(
            RoundId::new(),
            "tx-1",
            Money::from_minor(500),
            Split::new(Money::from_minor(300), Money::from_minor(200)),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_place_records_split() {
        let spin = place_spin();
        assert_eq!(spin.spin_type, SpinType::Place);
        assert_eq!(spin.real_amount, Money::from_minor(300));
        assert_eq!(spin.bonus_amount, Money::from_minor(200));
        assert!(spin.reference_id.is_none());
    }

    #[test]
    fn test_place_rejects_negative_amount() {
        let result = Spin::place(
            RoundId::new(),
            "tx",
            Money::from_minor(-1),
            Split::zero(),
            None,
        );
        assert!(matches!(result, Err(DomainError::InvalidAmount { .. })));
    }

    #[test]
    fn test_settle_rejects_zero_amount() {
        let result = Spin::settle(RoundId::new(), "tx", Money::zero(), Split::zero(), None);
        assert!(matches!(result, Err(DomainError::InvalidAmount { .. })));
    }

    #[test]
    fn test_rollback_references_original() {
        let original = place_spin();
        let rollback = Spin::rollback(&original, "tx-1").unwrap();

        assert_eq!(rollback.spin_type, SpinType::Rollback);
        assert_eq!(rollback.reference_id, Some(original.id));
        assert_eq!(rollback.round_id, original.round_id);
        assert_eq!(rollback.split(), original.split());
        assert_ne!(rollback.id, original.id);
    }

    #[test]
    fn test_rollback_of_rollback_is_rejected() {
        let original = place_spin();
        let rollback = Spin::rollback(&original, "tx-1").unwrap();
        assert_eq!(
            Spin::rollback(&rollback, "tx-2"),
            Err(DomainError::InvalidRollbackTarget(SpinType::Rollback))
        );
    }

    #[test]
    fn test_spin_type_parsing() {
        assert_eq!("SETTLE".parse::<SpinType>().unwrap(), SpinType::Settle);
        assert_eq!(SpinType::Rollback.to_string(), "ROLLBACK");
        assert!("WIN".parse::<SpinType>().is_err());
    }
}
