//! Requests, per-execution contexts and outcomes of the spin sagas.
//!
//! A context is created by its saga for one execution and threaded through the
//! steps as `&mut`. Steps write their results into the `Option` fields and
//! raise completion flags that compensations check before acting.

use domain::{Balance, Game, GameId, Money, Round, Session, Spin, SpinType, Split};

use crate::state::SagaState;
use crate::step::SagaContext;

/// Builds the default correlation id: `<session>:<external round>:<transaction>`.
///
/// Retried aggregator callbacks carry the same identifiers and therefore reuse
/// the same correlation id.
pub fn correlation_id(session: &Session, external_round_id: &str, transaction_id: &str) -> String {
    format!("{}:{}:{}", session.id, external_round_id, transaction_id)
}

/// Builds the wallet idempotency key of a money movement:
/// `<session>:<external round>:<spin type>:<transaction>`.
///
/// Aggregator transaction ids are only unique per session and spin type, so a
/// bet and a win may share one and two players may reuse the same value.
pub fn wallet_key(
    session: &Session,
    external_round_id: &str,
    spin_type: SpinType,
    transaction_id: &str,
) -> String {
    format!(
        "{}:{}:{}:{}",
        session.id, external_round_id, spin_type, transaction_id
    )
}

/// Result of a spin saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOutcome {
    /// The recorded spin (the original one for replays).
    pub spin: Spin,
    /// Player balance after the operation.
    pub balance: Balance,
    /// True if the request was a replay of an already recorded spin.
    pub replayed: bool,
}

/// Result of the end-round saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: Round,
    /// False if the round was already finished.
    pub newly_finished: bool,
}

// ---------------------------------------------------------------------------
// Place
// ---------------------------------------------------------------------------

/// A bet reported by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceSpinRequest {
    pub session: Session,
    pub game_id: GameId,
    pub external_round_id: String,
    pub transaction_id: String,
    pub amount: Money,
    pub free_spin_id: Option<String>,
}

/// Completion flags of the place saga.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaceFlags {
    pub round_created: bool,
    pub wallet_withdrawn: bool,
    pub spin_saved: bool,
    pub event_published: bool,
}

/// Scratch state of one place saga execution.
#[derive(Debug, Clone)]
pub struct PlaceSpinContext {
    pub(crate) request: PlaceSpinRequest,
    pub(crate) correlation_id: String,
    pub(crate) wallet_key: String,
    pub(crate) state: SagaState,
    pub(crate) game: Option<Game>,
    pub(crate) round: Option<Round>,
    pub(crate) balance: Option<Balance>,
    pub(crate) split: Option<Split>,
    pub(crate) spin: Option<Spin>,
    pub(crate) replayed: bool,
    pub(crate) flags: PlaceFlags,
}

impl PlaceSpinContext {
    pub fn new(request: PlaceSpinRequest) -> Self {
        let correlation_id = correlation_id(
            &request.session,
            &request.external_round_id,
            &request.transaction_id,
        );
        let wallet_key = wallet_key(
            &request.session,
            &request.external_round_id,
            SpinType::Place,
            &request.transaction_id,
        );
        Self {
            request,
            correlation_id,
            wallet_key,
            state: SagaState::Pending,
            game: None,
            round: None,
            balance: None,
            split: None,
            spin: None,
            replayed: false,
            flags: PlaceFlags::default(),
        }
    }

    /// Overrides the default correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn request(&self) -> &PlaceSpinRequest {
        &self.request
    }

    /// Key of the bet's debit in the wallet.
    pub fn wallet_key(&self) -> &str {
        &self.wallet_key
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn split(&self) -> Option<Split> {
        self.split
    }

    pub fn spin(&self) -> Option<&Spin> {
        self.spin.as_ref()
    }

    pub fn flags(&self) -> PlaceFlags {
        self.flags
    }

    pub fn is_replay(&self) -> bool {
        self.replayed
    }

    pub(crate) fn is_free_spin(&self) -> bool {
        self.request.free_spin_id.is_some()
    }

    pub(crate) fn outcome(&self) -> Option<SpinOutcome> {
        Some(SpinOutcome {
            spin: self.spin.clone()?,
            balance: self.balance?,
            replayed: self.replayed,
        })
    }
}

impl SagaContext for PlaceSpinContext {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn record_state(&mut self, state: SagaState) {
        self.state = state;
    }
}

// ---------------------------------------------------------------------------
// Settle
// ---------------------------------------------------------------------------

/// A win reported by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleSpinRequest {
    pub session: Session,
    pub external_round_id: String,
    pub transaction_id: String,
    pub amount: Money,
    pub free_spin_id: Option<String>,
    /// The aggregator reported this win as the last event of the round.
    pub finish_round: bool,
}

/// Completion flags of the settle saga.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleFlags {
    pub wallet_deposited: bool,
    pub spin_saved: bool,
    pub round_finished: bool,
    pub event_published: bool,
}

/// Scratch state of one settle saga execution.
#[derive(Debug, Clone)]
pub struct SettleSpinContext {
    pub(crate) request: SettleSpinRequest,
    pub(crate) correlation_id: String,
    pub(crate) wallet_key: String,
    pub(crate) state: SagaState,
    pub(crate) round: Option<Round>,
    pub(crate) place_spin: Option<Spin>,
    pub(crate) split: Option<Split>,
    pub(crate) balance: Option<Balance>,
    pub(crate) spin: Option<Spin>,
    pub(crate) replayed: bool,
    pub(crate) flags: SettleFlags,
}

impl SettleSpinContext {
    pub fn new(request: SettleSpinRequest) -> Self {
        let correlation_id = correlation_id(
            &request.session,
            &request.external_round_id,
            &request.transaction_id,
        );
        let wallet_key = wallet_key(
            &request.session,
            &request.external_round_id,
            SpinType::Settle,
            &request.transaction_id,
        );
        Self {
            request,
            correlation_id,
            wallet_key,
            state: SagaState::Pending,
            round: None,
            place_spin: None,
            split: None,
            balance: None,
            spin: None,
            replayed: false,
            flags: SettleFlags::default(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn request(&self) -> &SettleSpinRequest {
        &self.request
    }

    /// Key of the win's credit in the wallet.
    pub fn wallet_key(&self) -> &str {
        &self.wallet_key
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn place_spin(&self) -> Option<&Spin> {
        self.place_spin.as_ref()
    }

    pub fn split(&self) -> Option<Split> {
        self.split
    }

    pub fn flags(&self) -> SettleFlags {
        self.flags
    }

    pub fn is_replay(&self) -> bool {
        self.replayed
    }

    pub(crate) fn outcome(&self) -> Option<SpinOutcome> {
        Some(SpinOutcome {
            spin: self.spin.clone()?,
            balance: self.balance?,
            replayed: self.replayed,
        })
    }
}

impl SagaContext for SettleSpinContext {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn record_state(&mut self, state: SagaState) {
        self.state = state;
    }
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// A cancellation of an earlier bet or win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackSpinRequest {
    pub session: Session,
    pub external_round_id: String,
    /// Transaction id of the spin being reversed.
    pub transaction_id: String,
}

/// Completion flags of the rollback saga.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackFlags {
    pub wallet_refunded: bool,
    pub spin_saved: bool,
    pub event_published: bool,
}

/// Scratch state of one rollback saga execution.
#[derive(Debug, Clone)]
pub struct RollbackSpinContext {
    pub(crate) request: RollbackSpinRequest,
    pub(crate) correlation_id: String,
    pub(crate) state: SagaState,
    pub(crate) round: Option<Round>,
    pub(crate) original: Option<Spin>,
    pub(crate) balance: Option<Balance>,
    pub(crate) spin: Option<Spin>,
    pub(crate) replayed: bool,
    pub(crate) flags: RollbackFlags,
}

impl RollbackSpinContext {
    pub fn new(request: RollbackSpinRequest) -> Self {
        let correlation_id = format!(
            "{}:rollback",
            correlation_id(
                &request.session,
                &request.external_round_id,
                &request.transaction_id,
            )
        );
        Self {
            request,
            correlation_id,
            state: SagaState::Pending,
            round: None,
            original: None,
            balance: None,
            spin: None,
            replayed: false,
            flags: RollbackFlags::default(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn request(&self) -> &RollbackSpinRequest {
        &self.request
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Key of the wallet movement the original spin made.
    pub(crate) fn original_wallet_key(&self) -> Option<String> {
        let original = self.original.as_ref()?;
        Some(wallet_key(
            &self.request.session,
            &self.request.external_round_id,
            original.spin_type,
            &original.external_transaction_id,
        ))
    }

    pub fn original(&self) -> Option<&Spin> {
        self.original.as_ref()
    }

    pub fn flags(&self) -> RollbackFlags {
        self.flags
    }

    pub fn is_replay(&self) -> bool {
        self.replayed
    }

    pub(crate) fn outcome(&self) -> Option<SpinOutcome> {
        Some(SpinOutcome {
            spin: self.spin.clone()?,
            balance: self.balance?,
            replayed: self.replayed,
        })
    }
}

impl SagaContext for RollbackSpinContext {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn record_state(&mut self, state: SagaState) {
        self.state = state;
    }
}

// ---------------------------------------------------------------------------
// End
// ---------------------------------------------------------------------------

/// The aggregator's notice that a round is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRoundRequest {
    pub session: Session,
    pub external_round_id: String,
}

/// Scratch state of one end-round saga execution.
#[derive(Debug, Clone)]
pub struct EndRoundContext {
    pub(crate) request: EndRoundRequest,
    pub(crate) correlation_id: String,
    pub(crate) state: SagaState,
    pub(crate) round: Option<Round>,
    pub(crate) newly_finished: bool,
    pub(crate) event_published: bool,
}

impl EndRoundContext {
    pub fn new(request: EndRoundRequest) -> Self {
        let correlation_id = format!("{}:{}:end", request.session.id, request.external_round_id);
        Self {
            request,
            correlation_id,
            state: SagaState::Pending,
            round: None,
            newly_finished: false,
            event_published: false,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn request(&self) -> &EndRoundRequest {
        &self.request
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub(crate) fn outcome(&self) -> Option<RoundOutcome> {
        Some(RoundOutcome {
            round: self.round.clone()?,
            newly_finished: self.newly_finished,
        })
    }
}

impl SagaContext for EndRoundContext {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn record_state(&mut self, state: SagaState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PlayerId;

    fn request(session: Session) -> PlaceSpinRequest {
        PlaceSpinRequest {
            game_id: session.game_id.clone(),
            session,
            external_round_id: "r1".into(),
            transaction_id: "tx-1".into(),
            amount: Money::from_minor(100),
            free_spin_id: None,
        }
    }

    #[test]
    fn test_default_correlation_id_is_stable() {
        let session = Session::open(PlayerId::new(), "g-1", "EUR");
        let a = PlaceSpinContext::new(request(session.clone()));
        let b = PlaceSpinContext::new(request(session.clone()));

        assert_eq!(a.correlation_id(), b.correlation_id());
        assert_eq!(a.correlation_id(), format!("{}:r1:tx-1", session.id));
    }

    #[test]
    fn test_wallet_key_separates_sessions_and_spin_types() {
        let player = PlayerId::new();
        let first = Session::open(player, "g-1", "EUR");
        let second = Session::open(PlayerId::new(), "g-1", "EUR");

        let bet = wallet_key(&first, "r1", SpinType::Place, "1");
        assert_eq!(bet, format!("{}:r1:PLACE:1", first.id));
        assert_ne!(bet, wallet_key(&first, "r1", SpinType::Settle, "1"));
        assert_ne!(bet, wallet_key(&second, "r1", SpinType::Place, "1"));

        let ctx = PlaceSpinContext::new(request(first));
        assert_eq!(ctx.wallet_key(), bet);
        assert_eq!(ctx.state(), SagaState::Pending);
    }

    #[test]
    fn test_correlation_id_override() {
        let session = Session::open(PlayerId::new(), "g-1", "EUR");
        let ctx = PlaceSpinContext::new(request(session)).with_correlation_id("custom");
        assert_eq!(ctx.correlation_id(), "custom");
    }

    #[test]
    fn test_outcome_requires_spin_and_balance() {
        let session = Session::open(PlayerId::new(), "g-1", "EUR");
        let mut ctx = PlaceSpinContext::new(request(session));
        assert!(ctx.outcome().is_none());

        ctx.balance = Some(Balance::default());
        assert!(ctx.outcome().is_none());
        assert_eq!(ctx.flags(), PlaceFlags::default());
    }
}
