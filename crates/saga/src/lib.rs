//! Spin transaction sagas for slot aggregator callbacks.
//!
//! Each aggregator callback runs as a saga: an ordered list of steps over a
//! per-request context. Transient failures are retried; any other failure
//! compensates the completed steps in reverse order. The four sagas are:
//! 1. PlaceSpin: validate, resolve round, check balance, withdraw, save, publish
//! 2. SettleSpin: resolve round and bet, split the win, deposit, save, publish
//! 3. RollbackSpin: resolve the original spin, refund, save, publish
//! 4. EndRound: finish the round, publish once
//!
//! Replays of an already recorded callback short-circuit with the stored
//! spin and the current balance.

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod sagas;
pub mod services;
pub mod state;
pub mod step;

#[cfg(test)]
mod test_support;

pub use config::SagaConfig;
pub use context::{
    EndRoundRequest, PlaceSpinRequest, RollbackSpinRequest, RoundOutcome, SettleSpinRequest,
    SpinOutcome, wallet_key,
};
pub use coordinator::{Collaborators, SpinCoordinator};
pub use error::{CompensationFailure, SagaError, SagaFailure};
pub use orchestrator::{Orchestrator, SagaReport};
pub use retry::{Backoff, RetryPolicy};
pub use sagas::{EndRoundSaga, PlaceSpinSaga, RollbackSpinSaga, SettleSpinSaga};
pub use services::{
    EventPublisher, GameCatalog, InMemoryEventPublisher, InMemoryGameCatalog,
    InMemoryPlayerLimitService, InMemoryWalletService, MovementDirection, PlayerLimitService,
    TracingEventPublisher, WalletCommand, WalletMovement, WalletOperation, WalletReceipt,
    WalletService,
};
pub use state::SagaState;
pub use step::{SagaContext, SagaStep, StepOutcome};
