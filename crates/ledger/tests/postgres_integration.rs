//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{RoundId, SessionId};
use domain::{GameId, Money, Spin, SpinType, Split};
use ledger::{LedgerError, PostgresLedger, RoundRepository, SpinRepository, SpinRepositoryExt};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_rounds_and_spins.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PostgresLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE spins, rounds")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedger::new(pool)
}

fn place(round_id: RoundId, tx: &str) -> Spin {
    Spin::place(
        round_id,
        tx,
        Money::from_minor(500),
        Split::new(Money::from_minor(300), Money::from_minor(200)),
        None,
    )
    .unwrap()
}

#[tokio::test]
async fn find_or_create_round() {
    let ledger = get_test_ledger().await;
    let session = SessionId::new();
    let game = GameId::new("g-1");

    let first = ledger.find_or_create(session, &game, "r1").await.unwrap();
    let second = ledger.find_or_create(session, &game, "r1").await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.round.id, second.round.id);
    assert_eq!(second.round.game_id, game);
}

#[tokio::test]
async fn concurrent_find_or_create_converges() {
    let ledger = get_test_ledger().await;
    let session = SessionId::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .find_or_create(session, &GameId::new("g-1"), "race")
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    let mut created = 0;
    for handle in handles {
        let lookup = handle.await.unwrap();
        if lookup.created {
            created += 1;
        }
        ids.push(lookup.round.id);
    }

    assert_eq!(created, 1);
    assert!(ids.iter().all(|id| *id == ids[0]));
}

#[tokio::test]
async fn finish_round_is_idempotent() {
    let ledger = get_test_ledger().await;
    let round = ledger
        .find_or_create(SessionId::new(), &GameId::new("g-1"), "r1")
        .await
        .unwrap()
        .round;

    let first = ledger.finish(round.id).await.unwrap();
    let second = ledger.finish(round.id).await.unwrap();

    assert!(first.finished);
    assert!(first.finished_at.is_some());
    assert_eq!(first.finished_at, second.finished_at);

    let missing = ledger.finish(RoundId::new()).await;
    assert!(matches!(missing, Err(LedgerError::RoundNotFound(_))));
}

#[tokio::test]
async fn save_and_query_spins() {
    let ledger = get_test_ledger().await;
    let round = ledger
        .find_or_create(SessionId::new(), &GameId::new("g-1"), "r1")
        .await
        .unwrap()
        .round;

    let bet = ledger.save(place(round.id, "tx-1")).await.unwrap();
    let rollback = ledger
        .save(Spin::rollback(&bet, "tx-1").unwrap())
        .await
        .unwrap();

    let found = ledger
        .find_by_round_and_type(round.id, SpinType::Place)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, bet.id);
    assert_eq!(found.real_amount, Money::from_minor(300));
    assert_eq!(found.bonus_amount, Money::from_minor(200));

    let all = ledger.find_all_by_round(round.id).await.unwrap();
    assert_eq!(all.len(), 2);

    let reversal = ledger.find_rollback_of(round.id, &bet).await.unwrap();
    assert_eq!(reversal.map(|s| s.id), Some(rollback.id));
}

#[tokio::test]
async fn duplicate_spin_conflicts() {
    let ledger = get_test_ledger().await;
    let round = ledger
        .find_or_create(SessionId::new(), &GameId::new("g-1"), "r1")
        .await
        .unwrap()
        .round;

    ledger.save(place(round.id, "tx-1")).await.unwrap();
    let result = ledger.save(place(round.id, "tx-1")).await;

    assert!(matches!(result, Err(LedgerError::Conflict { .. })));
    let by_tx = ledger
        .find_by_transaction(round.id, SpinType::Place, "tx-1")
        .await
        .unwrap();
    assert!(by_tx.is_some());
}

#[tokio::test]
async fn second_bet_in_round_conflicts() {
    let ledger = get_test_ledger().await;
    let round = ledger
        .find_or_create(SessionId::new(), &GameId::new("g-1"), "r2")
        .await
        .unwrap()
        .round;

    ledger.save(place(round.id, "tx-1")).await.unwrap();
    let result = ledger.save(place(round.id, "tx-2")).await;

    assert!(matches!(result, Err(LedgerError::Conflict { .. })));
}
