//! Game catalog entries.

use serde::{Deserialize, Serialize};

/// Aggregator-supplied game identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GameId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A game offered through an aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    /// Tag of the aggregator that serves this game (e.g. `onegamehub`).
    pub aggregator: String,
    /// When false, every bet, win and refund is booked against real funds only.
    pub bonus_bet_enabled: bool,
    /// Inactive games reject new bets.
    pub active: bool,
}

impl Game {
    pub fn new(id: impl Into<GameId>, name: impl Into<String>, aggregator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aggregator: aggregator.into(),
            bonus_bet_enabled: false,
            active: true,
        }
    }

    pub fn with_bonus_bets(mut self, enabled: bool) -> Self {
        self.bonus_bet_enabled = enabled;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}
