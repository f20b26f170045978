//! Wallet service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use common::PlayerId;
use domain::{Balance, Currency, Split};

use crate::error::SagaError;

/// A keyed money movement against a player's wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCommand {
    pub player_id: PlayerId,
    /// Idempotency key of the movement, see [`crate::context::wallet_key`].
    pub transaction_id: String,
    pub currency: Currency,
    pub split: Split,
}

/// Result of a wallet mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletReceipt {
    /// Balance after the call.
    pub balance: Balance,
    /// False if the call was absorbed as a replay of an earlier one.
    pub applied: bool,
}

/// Direction of a recorded wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementDirection {
    Debit,
    Credit,
}

impl MovementDirection {
    fn inverse(self) -> Self {
        match self {
            MovementDirection::Debit => MovementDirection::Credit,
            MovementDirection::Credit => MovementDirection::Debit,
        }
    }
}

/// A live (not reversed) movement recorded under an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletMovement {
    pub player_id: PlayerId,
    pub currency: Currency,
    pub direction: MovementDirection,
    pub split: Split,
}

/// Trait for the player wallet.
///
/// Every mutation is idempotent on `transaction_id`: repeating a call with a
/// key that is already applied returns the current balance with
/// `applied = false`. `rollback` reverses the movement recorded under the key
/// and releases it, so a later call with the same key applies again. A key
/// belongs to the player that first used it.
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Reads the player's balance.
    async fn balance(&self, player_id: PlayerId, currency: &Currency)
    -> Result<Balance, SagaError>;

    /// Debits the split from the player.
    async fn withdraw(&self, command: &WalletCommand) -> Result<WalletReceipt, SagaError>;

    /// Credits the split to the player.
    async fn deposit(&self, command: &WalletCommand) -> Result<WalletReceipt, SagaError>;

    /// Reverses the movement recorded under `command.transaction_id`.
    async fn rollback(&self, command: &WalletCommand) -> Result<WalletReceipt, SagaError>;

    /// Looks up the live movement recorded under `transaction_id`.
    async fn find_movement(&self, transaction_id: &str)
    -> Result<Option<WalletMovement>, SagaError>;
}

/// Wallet operations, used for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletOperation {
    Balance,
    Withdraw,
    Deposit,
    Rollback,
    Lookup,
}

#[derive(Debug, Clone)]
struct Movement {
    player_id: PlayerId,
    currency: Currency,
    direction: MovementDirection,
    split: Split,
    reversed: bool,
}

impl Movement {
    fn live(&self) -> Option<WalletMovement> {
        (!self.reversed).then(|| WalletMovement {
            player_id: self.player_id,
            currency: self.currency.clone(),
            direction: self.direction,
            split: self.split,
        })
    }
}

#[derive(Debug, Default)]
struct InMemoryWalletState {
    balances: HashMap<(PlayerId, Currency), Balance>,
    movements: HashMap<String, Movement>,
    always_fail: HashMap<WalletOperation, bool>,
    fail_next: HashMap<WalletOperation, u32>,
    calls: HashMap<WalletOperation, u32>,
}

impl InMemoryWalletState {
    fn check(&mut self, operation: WalletOperation) -> Result<(), SagaError> {
        *self.calls.entry(operation).or_default() += 1;

        if self.always_fail.get(&operation).copied().unwrap_or(false) {
            return Err(SagaError::ExternalService(format!(
                "wallet {operation:?} unavailable"
            )));
        }
        if let Some(remaining) = self.fail_next.get_mut(&operation)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(SagaError::ExternalService(format!(
                "wallet {operation:?} timed out"
            )));
        }
        Ok(())
    }

    fn balance(&self, player_id: PlayerId, currency: &Currency) -> Balance {
        self.balances
            .get(&(player_id, currency.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn apply(
        &mut self,
        player_id: PlayerId,
        currency: &Currency,
        direction: MovementDirection,
        split: &Split,
    ) -> Result<Balance, SagaError> {
        let current = self.balance(player_id, currency);
        let next = match direction {
            MovementDirection::Debit => {
                if !current.covers(split) {
                    return Err(SagaError::InsufficientBalance {
                        requested: split.total(),
                        available: current.total(),
                    });
                }
                current.checked_debit(split)
            }
            MovementDirection::Credit => current.checked_credit(split),
        };
        let next = next.ok_or_else(|| {
            SagaError::Validation(format!("balance overflow for player {player_id}"))
        })?;
        self.balances.insert((player_id, currency.clone()), next);
        Ok(next)
    }

    fn move_money(
        &mut self,
        command: &WalletCommand,
        direction: MovementDirection,
    ) -> Result<WalletReceipt, SagaError> {
        if let Some(existing) = self.movements.get(&command.transaction_id) {
            if existing.player_id != command.player_id {
                return Err(SagaError::DuplicateEntity(format!(
                    "wallet transaction {} belongs to another player",
                    command.transaction_id
                )));
            }
            if existing.reversed {
                return self.record(command, direction);
            }
            if existing.direction != direction {
                return Err(SagaError::DuplicateEntity(format!(
                    "wallet transaction {}",
                    command.transaction_id
                )));
            }
            return Ok(WalletReceipt {
                balance: self.balance(command.player_id, &command.currency),
                applied: false,
            });
        }
        self.record(command, direction)
    }

    fn record(
        &mut self,
        command: &WalletCommand,
        direction: MovementDirection,
    ) -> Result<WalletReceipt, SagaError> {
        let balance = self.apply(
            command.player_id,
            &command.currency,
            direction,
            &command.split,
        )?;
        self.movements.insert(
            command.transaction_id.clone(),
            Movement {
                player_id: command.player_id,
                currency: command.currency.clone(),
                direction,
                split: command.split,
                reversed: false,
            },
        );
        Ok(WalletReceipt {
            balance,
            applied: true,
        })
    }
}

/// In-memory wallet for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWalletService {
    state: Arc<RwLock<InMemoryWalletState>>,
}

impl InMemoryWalletService {
    /// Creates an empty wallet.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryWalletState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryWalletState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a player's balance.
    pub fn set_balance(&self, player_id: PlayerId, currency: impl Into<Currency>, balance: Balance) {
        self.write()
            .balances
            .insert((player_id, currency.into()), balance);
    }

    /// Returns a player's balance.
    pub fn balance_of(&self, player_id: PlayerId, currency: impl Into<Currency>) -> Balance {
        self.read().balance(player_id, &currency.into())
    }

    /// Makes every call of `operation` fail with a transient error.
    pub fn set_fail_on(&self, operation: WalletOperation, fail: bool) {
        self.write().always_fail.insert(operation, fail);
    }

    /// Makes the next `times` calls of `operation` fail with a transient error.
    pub fn fail_next(&self, operation: WalletOperation, times: u32) {
        self.write().fail_next.insert(operation, times);
    }

    /// Returns how many times `operation` was called, failed calls included.
    pub fn calls(&self, operation: WalletOperation) -> u32 {
        self.read().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Returns true if a movement is recorded and not reversed under the key.
    pub fn has_movement(&self, transaction_id: &str) -> bool {
        self.read()
            .movements
            .get(transaction_id)
            .is_some_and(|m| !m.reversed)
    }

    /// Number of live movements across all players.
    pub fn live_movements(&self) -> usize {
        self.read().movements.values().filter(|m| !m.reversed).count()
    }
}

#[async_trait]
impl WalletService for InMemoryWalletService {
    async fn balance(
        &self,
        player_id: PlayerId,
        currency: &Currency,
    ) -> Result<Balance, SagaError> {
        let mut state = self.write();
        state.check(WalletOperation::Balance)?;
        Ok(state.balance(player_id, currency))
    }

    async fn withdraw(&self, command: &WalletCommand) -> Result<WalletReceipt, SagaError> {
        let mut state = self.write();
        state.check(WalletOperation::Withdraw)?;
        state.move_money(command, MovementDirection::Debit)
    }

    async fn deposit(&self, command: &WalletCommand) -> Result<WalletReceipt, SagaError> {
        let mut state = self.write();
        state.check(WalletOperation::Deposit)?;
        state.move_money(command, MovementDirection::Credit)
    }

    async fn rollback(&self, command: &WalletCommand) -> Result<WalletReceipt, SagaError> {
        let mut state = self.write();
        state.check(WalletOperation::Rollback)?;

        let Some(movement) = state
            .movements
            .get(&command.transaction_id)
            .filter(|m| m.player_id == command.player_id)
            .cloned()
        else {
            return Err(SagaError::not_found(
                "wallet transaction",
                &command.transaction_id,
            ));
        };
        if movement.reversed {
            return Ok(WalletReceipt {
                balance: state.balance(movement.player_id, &movement.currency),
                applied: false,
            });
        }

        let balance = state.apply(
            movement.player_id,
            &movement.currency,
            movement.direction.inverse(),
            &movement.split,
        )?;
        if let Some(recorded) = state.movements.get_mut(&command.transaction_id) {
            recorded.reversed = true;
        }
        Ok(WalletReceipt {
            balance,
            applied: true,
        })
    }

    async fn find_movement(
        &self,
        transaction_id: &str,
    ) -> Result<Option<WalletMovement>, SagaError> {
        let mut state = self.write();
        state.check(WalletOperation::Lookup)?;
        Ok(state.movements.get(transaction_id).and_then(Movement::live))
    }
}
