//! Round and spin persistence.
//!
//! Two implementations share the [`RoundRepository`] and [`SpinRepository`]
//! contracts: [`InMemoryLedger`] for tests and local runs, and
//! [`PostgresLedger`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use store::{RoundLookup, RoundRepository, SpinRepository, SpinRepositoryExt};
