//! Game round record.

use chrono::{DateTime, Utc};
use common::{RoundId, SessionId};
use serde::{Deserialize, Serialize};

use crate::game::GameId;

/// A single aggregator-reported game round.
///
/// `(session_id, external_round_id)` is unique: every spin reported for the
/// same aggregator round resolves to the same `Round`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub session_id: SessionId,
    pub game_id: GameId,
    pub external_round_id: String,
    pub finished: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Round {
    /// Creates a new open round.
    pub fn open(
        session_id: SessionId,
        game_id: GameId,
        external_round_id: impl Into<String>,
    ) -> Self {
        Self {
            id: RoundId::new(),
            session_id,
            game_id,
            external_round_id: external_round_id.into(),
            finished: false,
            finished_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.finished
    }

    /// Marks the round finished. Returns false if it already was.
    pub fn finish(&mut self, at: DateTime<Utc>) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.finished_at = Some(at);
        true
    }
}
