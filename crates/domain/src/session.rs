//! Player game sessions.
//!
//! Sessions are opened outside this system; the sagas only read them.

use common::{PlayerId, SessionId};
use serde::{Deserialize, Serialize};

use crate::game::GameId;
use crate::money::Currency;

/// Device class the session was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Desktop,
    Mobile,
}

/// A player's session in one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub currency: Currency,
    pub locale: String,
    pub platform: Platform,
    /// Token handed to the aggregator at launch and echoed back on callbacks.
    pub token: String,
    /// Token assigned by the aggregator, if any.
    pub external_token: Option<String>,
}

impl Session {
    /// Creates a session with a fresh id and token.
    pub fn open(player_id: PlayerId, game_id: impl Into<GameId>, currency: impl Into<Currency>) -> Self {
        let id = SessionId::new();
        Self {
            id,
            game_id: game_id.into(),
            player_id,
            currency: currency.into(),
            locale: "en".to_string(),
            platform: Platform::default(),
            token: uuid::Uuid::new_v4().simple().to_string(),
            external_token: None,
        }
    }
}
