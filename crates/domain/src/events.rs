//! Domain events published after a spin or round changes.

use chrono::{DateTime, Utc};
use common::{PlayerId, RoundId, SessionId, SpinId};
use serde::{Deserialize, Serialize};

use crate::money::{Currency, Money};
use crate::round::Round;
use crate::session::Session;
use crate::spin::Spin;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense.
pub trait DomainEvent: Serialize + Send + Sync + Clone {
    /// Returns the routing name used on the message bus.
    fn event_type(&self) -> &'static str;

    /// Returns the correlation id of the saga that produced the event.
    fn correlation_id(&self) -> &str;
}

/// Events published by the spin sagas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SpinEvent {
    /// A bet was debited and recorded.
    SpinPlaced(SpinEventData),

    /// A win was credited and recorded.
    SpinSettled(SpinEventData),

    /// An earlier bet or win was reversed.
    SpinRolledBack(SpinEventData),

    /// The aggregator reported that no further spins follow for the round.
    RoundEnded(RoundEndedData),
}

impl DomainEvent for SpinEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SpinEvent::SpinPlaced(_) => "spin.placed",
            SpinEvent::SpinSettled(_) => "spin.settled",
            SpinEvent::SpinRolledBack(_) => "spin.rolled_back",
            SpinEvent::RoundEnded(_) => "round.ended",
        }
    }

    fn correlation_id(&self) -> &str {
        match self {
            SpinEvent::SpinPlaced(data)
            | SpinEvent::SpinSettled(data)
            | SpinEvent::SpinRolledBack(data) => &data.correlation_id,
            SpinEvent::RoundEnded(data) => &data.correlation_id,
        }
    }
}

/// Payload shared by all spin events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinEventData {
    pub correlation_id: String,
    pub spin_id: SpinId,
    pub round_id: Option<RoundId>,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub external_round_id: String,
    pub transaction_id: String,
    pub currency: Currency,
    pub amount: Money,
    pub real_amount: Money,
    pub bonus_amount: Money,
    /// Set for promotional spins; downstream win accounting skips these.
    pub free_spin_id: Option<String>,
    /// For rollbacks, the spin that was reversed.
    pub reference_id: Option<SpinId>,
    pub occurred_at: DateTime<Utc>,
}

/// Payload of `round.ended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEndedData {
    pub correlation_id: String,
    pub round_id: RoundId,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub external_round_id: String,
    pub finished_at: DateTime<Utc>,
}

// Convenience constructors
impl SpinEvent {
    fn spin_data(
        correlation_id: &str,
        session: &Session,
        external_round_id: &str,
        spin: &Spin,
    ) -> SpinEventData {
        SpinEventData {
            correlation_id: correlation_id.to_string(),
            spin_id: spin.id,
            round_id: spin.round_id,
            session_id: session.id,
            player_id: session.player_id,
            external_round_id: external_round_id.to_string(),
            transaction_id: spin.external_transaction_id.clone(),
            currency: session.currency.clone(),
            amount: spin.amount,
            real_amount: spin.real_amount,
            bonus_amount: spin.bonus_amount,
            free_spin_id: spin.free_spin_id.clone(),
            reference_id: spin.reference_id,
            occurred_at: Utc::now(),
        }
    }

    /// Creates a `spin.placed` event.
    pub fn placed(correlation_id: &str, session: &Session, round: &Round, spin: &Spin) -> Self {
        SpinEvent::SpinPlaced(Self::spin_data(
            correlation_id,
            session,
            &round.external_round_id,
            spin,
        ))
    }

    /// Creates a `spin.settled` event.
    pub fn settled(correlation_id: &str, session: &Session, round: &Round, spin: &Spin) -> Self {
        SpinEvent::SpinSettled(Self::spin_data(
            correlation_id,
            session,
            &round.external_round_id,
            spin,
        ))
    }

    /// Creates a `spin.rolled_back` event.
    pub fn rolled_back(
        correlation_id: &str,
        session: &Session,
        external_round_id: &str,
        spin: &Spin,
    ) -> Self {
        SpinEvent::SpinRolledBack(Self::spin_data(
            correlation_id,
            session,
            external_round_id,
            spin,
        ))
    }

    /// Creates a `round.ended` event.
    pub fn round_ended(correlation_id: &str, session: &Session, round: &Round) -> Self {
        SpinEvent::RoundEnded(RoundEndedData {
            correlation_id: correlation_id.to_string(),
            round_id: round.id,
            session_id: session.id,
            player_id: session.player_id,
            external_round_id: round.external_round_id.clone(),
            finished_at: round.finished_at.unwrap_or_else(Utc::now),
        })
    }
}
