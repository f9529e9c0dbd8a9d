//! Summary store capability and its SQLite implementation.
//!
//! The cycle orchestrator only ever appends; it never updates or deletes.
//! A cycle's summaries go in one transaction: either every row of the cycle
//! is written or none is.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::models::Summary;
use super::queries;
use crate::errors::AppError;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits on a locked database before failing.
const DB_BUSY_TIMEOUT_SECS: u64 = 30;

/// Append-only sink for daily summaries.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Persist a cycle's summaries atomically, returning the new row ids in
    /// input order.
    async fn append_all(&self, summaries: &[Summary]) -> Result<Vec<i64>, AppError>;
}

/// Open (creating if needed) the SQLite database and run migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(DB_BUSY_TIMEOUT_SECS));

    let pool = SqlitePoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Apply embedded migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!()
        .run(pool)
        .await
        .map_err(|e| AppError::Persistence(e.into()))?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// SQLite-backed summary store sharing the application pool.
#[derive(Debug, Clone)]
pub struct SqliteSummaryStore {
    pool: SqlitePool,
}

impl SqliteSummaryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryStore for SqliteSummaryStore {
    async fn append_all(&self, summaries: &[Summary]) -> Result<Vec<i64>, AppError> {
        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let id = queries::insert_summary(&mut *tx, summary).await?;
            tracing::debug!(
                "Stored summary #{} for {} on {} ({} readings)",
                id,
                summary.city,
                summary.date,
                summary.reading_count
            );
            ids.push(id);
        }
        tx.commit().await?;
        Ok(ids)
    }
}
