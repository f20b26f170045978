//! External collaborators used by the spin sagas.

pub mod games;
pub mod limits;
pub mod publisher;
pub mod wallet;

pub use games::{GameCatalog, InMemoryGameCatalog};
pub use limits::{InMemoryPlayerLimitService, PlayerLimitService};
pub use publisher::{EventPublisher, InMemoryEventPublisher, TracingEventPublisher};
pub use wallet::{
    InMemoryWalletService, MovementDirection, WalletCommand, WalletMovement, WalletOperation,
    WalletReceipt, WalletService,
};
