//! Postgres-backed ledger store.

use crate::error::LedgerError;
use crate::models::{Entry, LedgerRecord, OwnerSummary, YearMonth};
use crate::services::ledger::{clamp_limit, LedgerStore};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "expense-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// One transaction, one multi-row INSERT. Ids come from a single
    /// sequence-backed statement, so ascending id order is entry order.
    #[instrument(skip(self, entries), fields(owner_id = owner_id, entry_count = entries.len()))]
    async fn insert_batch(
        &self,
        owner_id: i64,
        entries: &[Entry],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<i64>, LedgerError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_batch"])
            .start_timer();

        let texts: Vec<String> = entries.iter().map(Entry::render).collect();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO ledger_records (owner_id, text, created_at)
            SELECT $1, batch.text, $3
            FROM UNNEST($2::text[]) WITH ORDINALITY AS batch(text, position)
            ORDER BY batch.position
            RETURNING id
            "#,
        )
        .bind(owner_id)
        .bind(&texts)
        .bind(recorded_at)
        .fetch_all(&mut *tx)
        .await;

        let mut ids = match inserted {
            Ok(ids) => ids,
            Err(e) => {
                tx.rollback().await.ok();
                let err = LedgerError::from(e);
                error!(error = %err, "Batch insert rolled back");
                return Err(err);
            }
        };

        if ids.len() != entries.len() {
            tx.rollback().await.ok();
            return Err(LedgerError::Database(format!(
                "expected {} inserted rows, got {}",
                entries.len(),
                ids.len()
            )));
        }

        tx.commit().await?;
        timer.observe_duration();

        ids.sort_unstable();

        info!(owner_id = owner_id, row_count = ids.len(), "Ledger batch inserted");

        Ok(ids)
    }

    /// Ownership is part of the DELETE predicate; there is no separate
    /// lookup that could race with it.
    #[instrument(skip(self, ids), fields(owner_id = owner_id, id_count = ids.len()))]
    async fn delete_by_ids_for_owner(
        &self,
        ids: &[i64],
        owner_id: i64,
    ) -> Result<u64, LedgerError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_by_ids_for_owner"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM ledger_records WHERE owner_id = $1 AND id = ANY($2)")
            .bind(owner_id)
            .bind(ids)
            .execute(&mut *tx)
            .await;

        let deleted = match result {
            Ok(done) => done.rows_affected(),
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e.into());
            }
        };

        tx.commit().await?;
        timer.observe_duration();

        info!(owner_id = owner_id, deleted = deleted, "Ledger rows deleted");

        Ok(deleted)
    }

    #[instrument(skip(self), fields(owner_id = owner_id, month = %month))]
    async fn records_for_month(
        &self,
        owner_id: i64,
        month: YearMonth,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["records_for_month"])
            .start_timer();

        let (start, end) = month.range();
        let records = sqlx::query_as::<_, LedgerRecord>(
            r#"
            SELECT id, owner_id, text, created_at
            FROM ledger_records
            WHERE owner_id = $1
              AND created_at >= $2
              AND created_at < $3
            ORDER BY created_at, id
            "#,
        )
        .bind(owner_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(records)
    }

    #[instrument(skip(self))]
    async fn distinct_owners(&self) -> Result<Vec<i64>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["distinct_owners"])
            .start_timer();

        let owners = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT owner_id FROM ledger_records ORDER BY owner_id",
        )
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(owners)
    }

    #[instrument(skip(self), fields(owner_id = owner_id))]
    async fn available_months(&self, owner_id: i64) -> Result<Vec<YearMonth>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["available_months"])
            .start_timer();

        let rows: Vec<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT DISTINCT
                EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::int AS year,
                EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::int AS month
            FROM ledger_records
            WHERE owner_id = $1
            ORDER BY year DESC, month DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(rows
            .into_iter()
            .filter_map(|(year, month)| YearMonth::new(year, u32::try_from(month).ok()?))
            .collect())
    }

    #[instrument(skip(self), fields(owner_id = owner_id))]
    async fn recent_records(
        &self,
        owner_id: i64,
        limit: i64,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recent_records"])
            .start_timer();

        let records = sqlx::query_as::<_, LedgerRecord>(
            r#"
            SELECT id, owner_id, text, created_at
            FROM ledger_records
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(records)
    }

    /// Amounts live inside the stored text, so the sum is computed here
    /// rather than in SQL.
    #[instrument(skip(self), fields(owner_id = owner_id))]
    async fn owner_summary(&self, owner_id: i64) -> Result<OwnerSummary, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["owner_summary"])
            .start_timer();

        let records = sqlx::query_as::<_, LedgerRecord>(
            "SELECT id, owner_id, text, created_at FROM ledger_records WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(OwnerSummary::from_records(owner_id, &records))
    }
}
