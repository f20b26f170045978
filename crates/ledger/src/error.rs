use common::RoundId;
use thiserror::Error;

/// Errors that can occur when reading or writing rounds and spins.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A uniqueness constraint rejected the write.
    #[error("Duplicate {entity}: {key}")]
    Conflict { entity: &'static str, key: String },

    /// The round does not exist.
    #[error("Round not found: {0}")]
    RoundNotFound(RoundId),

    /// A stored row could not be mapped back to the domain model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
