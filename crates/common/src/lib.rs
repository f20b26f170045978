//! Identifier types shared across the slot integration crates.

pub mod types;

pub use types::{PlayerId, RoundId, SessionId, SpinId};
