//! Domain model for the slot aggregator wallet integration.
//!
//! This crate provides:
//! - `Money`, `Currency`, `Balance` and the real/bonus `Split` of an amount
//! - The persistent `Round` and `Spin` records and the read-only `Session`
//! - The real/bonus split policy applied to bets, wins and refunds
//! - Domain events published after a spin or round changes

pub mod error;
pub mod events;
pub mod game;
pub mod money;
pub mod round;
pub mod session;
pub mod spin;
pub mod split;

pub use error::DomainError;
pub use events::{DomainEvent, RoundEndedData, SpinEvent, SpinEventData};
pub use game::{Game, GameId};
pub use money::{Balance, Currency, Money, Split};
pub use round::Round;
pub use session::{Platform, Session};
pub use spin::{Spin, SpinType};
pub use split::{proportional_split, withdrawal_split};
