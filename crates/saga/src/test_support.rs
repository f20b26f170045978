//! Shared fixture for the saga unit tests.

use std::sync::Arc;

use common::PlayerId;
use domain::{Balance, Game, Money, Round, Session};
use ledger::{InMemoryLedger, RoundRepository};

use crate::context::{EndRoundRequest, PlaceSpinRequest, RollbackSpinRequest, SettleSpinRequest};
use crate::coordinator::Collaborators;
use crate::services::{
    InMemoryEventPublisher, InMemoryGameCatalog, InMemoryPlayerLimitService,
    InMemoryWalletService,
};

pub(crate) struct Fixture {
    pub ledger: InMemoryLedger,
    pub wallet: InMemoryWalletService,
    pub limits: InMemoryPlayerLimitService,
    pub games: InMemoryGameCatalog,
    pub events: InMemoryEventPublisher,
    pub session: Session,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_game(Game::new("g-1", "Book of Tests", "onegamehub"))
    }

    pub fn with_bonus_bets() -> Self {
        Self::with_game(Game::new("g-1", "Book of Tests", "onegamehub").with_bonus_bets(true))
    }

    fn with_game(game: Game) -> Self {
        let games = InMemoryGameCatalog::new();
        games.upsert(game);
        Self {
            ledger: InMemoryLedger::new(),
            wallet: InMemoryWalletService::new(),
            limits: InMemoryPlayerLimitService::new(),
            games,
            events: InMemoryEventPublisher::new(),
            session: Session::open(PlayerId::new(), "g-1", "EUR"),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::with_ledger(
            self.ledger.clone(),
            Arc::new(self.wallet.clone()),
            Arc::new(self.limits.clone()),
            Arc::new(self.games.clone()),
            Arc::new(self.events.clone()),
        )
    }

    pub fn fund(&self, real: i64, bonus: i64) {
        self.wallet.set_balance(
            self.session.player_id,
            "EUR",
            Balance::new(Money::from_minor(real), Money::from_minor(bonus)),
        );
    }

    pub fn balance(&self) -> Balance {
        self.wallet.balance_of(self.session.player_id, "EUR")
    }

    pub async fn round(&self, external_round_id: &str) -> Option<Round> {
        self.ledger
            .find_by_session_and_ext_id(self.session.id, external_round_id)
            .await
            .unwrap()
    }

    pub fn place(&self, round: &str, tx: &str, amount: i64) -> PlaceSpinRequest {
        PlaceSpinRequest {
            session: self.session.clone(),
            game_id: self.session.game_id.clone(),
            external_round_id: round.to_string(),
            transaction_id: tx.to_string(),
            amount: Money::from_minor(amount),
            free_spin_id: None,
        }
    }

    pub fn settle(&self, round: &str, tx: &str, amount: i64, finish_round: bool) -> SettleSpinRequest {
        SettleSpinRequest {
            session: self.session.clone(),
            external_round_id: round.to_string(),
            transaction_id: tx.to_string(),
            amount: Money::from_minor(amount),
            free_spin_id: None,
            finish_round,
        }
    }

    pub fn rollback(&self, round: &str, tx: &str) -> RollbackSpinRequest {
        RollbackSpinRequest {
            session: self.session.clone(),
            external_round_id: round.to_string(),
            transaction_id: tx.to_string(),
        }
    }

    pub fn end(&self, round: &str) -> EndRoundRequest {
        EndRoundRequest {
            session: self.session.clone(),
            external_round_id: round.to_string(),
        }
    }
}
