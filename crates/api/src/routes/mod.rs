//! HTTP route handlers.

pub mod callbacks;
pub mod freespins;
pub mod health;
pub mod metrics;
pub mod rounds;
pub mod sessions;
