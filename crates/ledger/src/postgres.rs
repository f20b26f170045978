use async_trait::async_trait;
use chrono::Utc;
use common::{RoundId, SessionId, SpinId};
use domain::{GameId, Money, Round, Spin, SpinType};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    LedgerError, Result,
    store::{RoundLookup, RoundRepository, SpinRepository},
};

const ROUND_COLUMNS: &str =
    "id, session_id, game_id, external_round_id, finished, finished_at, created_at";

const SPIN_COLUMNS: &str = "id, round_id, spin_type, external_transaction_id, amount, real_amount, bonus_amount, free_spin_id, reference_id, created_at";

/// PostgreSQL-backed ledger implementation.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_round(row: PgRow) -> Result<Round> {
        Ok(Round {
            id: RoundId::from_uuid(row.try_get::<Uuid, _>("id")?),
            session_id: SessionId::from_uuid(row.try_get::<Uuid, _>("session_id")?),
            game_id: GameId::new(row.try_get::<String, _>("game_id")?),
            external_round_id: row.try_get("external_round_id")?,
            finished: row.try_get("finished")?,
            finished_at: row.try_get("finished_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_spin(row: PgRow) -> Result<Spin> {
        let spin_type: String = row.try_get("spin_type")?;
        let spin_type = spin_type
            .parse::<SpinType>()
            .map_err(|e| LedgerError::Corrupt(e.to_string()))?;

        Ok(Spin {
            id: SpinId::from_uuid(row.try_get::<Uuid, _>("id")?),
            round_id: row
                .try_get::<Option<Uuid>, _>("round_id")?
                .map(RoundId::from_uuid),
            spin_type,
            external_transaction_id: row.try_get("external_transaction_id")?,
            amount: Money::from_minor(row.try_get("amount")?),
            real_amount: Money::from_minor(row.try_get("real_amount")?),
            bonus_amount: Money::from_minor(row.try_get("bonus_amount")?),
            free_spin_id: row.try_get("free_spin_id")?,
            reference_id: row
                .try_get::<Option<Uuid>, _>("reference_id")?
                .map(SpinId::from_uuid),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl RoundRepository for PostgresLedger {
    #[tracing::instrument(skip(self))]
    async fn find_or_create(
        &self,
        session_id: SessionId,
        game_id: &GameId,
        external_round_id: &str,
    ) -> Result<RoundLookup> {
        let candidate = Round::open(session_id, game_id.clone(), external_round_id);

        // The unique constraint picks the winner; a conflicting insert returns no row.
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO rounds ({ROUND_COLUMNS})
            VALUES ($1, $2, $3, $4, FALSE, NULL, $5)
            ON CONFLICT (session_id, external_round_id) DO NOTHING
            RETURNING {ROUND_COLUMNS}
            "#
        ))
        .bind(candidate.id.as_uuid())
        .bind(session_id.as_uuid())
        .bind(game_id.as_str())
        .bind(external_round_id)
        .bind(candidate.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            metrics::counter!("ledger_rounds_created_total").increment(1);
            return Ok(RoundLookup {
                round: Self::row_to_round(row)?,
                created: true,
            });
        }

        let round = self
            .find_by_session_and_ext_id(session_id, external_round_id)
            .await?
            .ok_or_else(|| {
                LedgerError::Corrupt(format!(
                    "round {external_round_id} conflicted on insert but cannot be read"
                ))
            })?;

        Ok(RoundLookup {
            round,
            created: false,
        })
    }

    async fn find_by_session_and_ext_id(
        &self,
        session_id: SessionId,
        external_round_id: &str,
    ) -> Result<Option<Round>> {
        let row = sqlx::query(&format!(
            "SELECT {ROUND_COLUMNS} FROM rounds WHERE session_id = $1 AND external_round_id = $2"
        ))
        .bind(session_id.as_uuid())
        .bind(external_round_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_round).transpose()
    }

    async fn find(&self, round_id: RoundId) -> Result<Option<Round>> {
        let row = sqlx::query(&format!("SELECT {ROUND_COLUMNS} FROM rounds WHERE id = $1"))
            .bind(round_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_round).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn finish(&self, round_id: RoundId) -> Result<Round> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE rounds
            SET finished = TRUE, finished_at = COALESCE(finished_at, $2)
            WHERE id = $1
            RETURNING {ROUND_COLUMNS}
            "#
        ))
        .bind(round_id.as_uuid())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::RoundNotFound(round_id))?;

        Self::row_to_round(row)
    }
}

#[async_trait]
impl SpinRepository for PostgresLedger {
    async fn find_by_round_and_type(
        &self,
        round_id: RoundId,
        spin_type: SpinType,
    ) -> Result<Option<Spin>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SPIN_COLUMNS}
            FROM spins
            WHERE round_id = $1 AND spin_type = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(round_id.as_uuid())
        .bind(spin_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_spin).transpose()
    }

    async fn find_all_by_round(&self, round_id: RoundId) -> Result<Vec<Spin>> {
        let rows = sqlx::query(&format!(
            "SELECT {SPIN_COLUMNS} FROM spins WHERE round_id = $1 ORDER BY created_at ASC"
        ))
        .bind(round_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_spin).collect()
    }

    #[tracing::instrument(skip(self, spin), fields(spin_id = %spin.id, spin_type = %spin.spin_type))]
    async fn save(&self, spin: Spin) -> Result<Spin> {
        sqlx::query(&format!(
            r#"
            INSERT INTO spins ({SPIN_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#
        ))
        .bind(spin.id.as_uuid())
        .bind(spin.round_id.map(|id| id.as_uuid()))
        .bind(spin.spin_type.as_str())
        .bind(&spin.external_transaction_id)
        .bind(spin.amount.minor())
        .bind(spin.real_amount.minor())
        .bind(spin.bonus_amount.minor())
        .bind(&spin.free_spin_id)
        .bind(spin.reference_id.map(|id| id.as_uuid()))
        .bind(spin.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return LedgerError::Conflict {
                    entity: "spin",
                    key: format!("{} {}", spin.spin_type, spin.external_transaction_id),
                };
            }
            LedgerError::Database(e)
        })?;

        Ok(spin)
    }
}
