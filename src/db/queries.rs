use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool};

use super::models::{Summary, SummaryRow};

/// Filters for listing persisted summaries.
#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub city: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: i64,
}

/// Insert a summary row (append-only). Returns the auto-assigned id.
///
/// Takes any executor so callers can insert inside a transaction.
pub async fn insert_summary<'e, E>(executor: E, summary: &Summary) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO weather_summary (
            city, date, avg_temp, max_temp, min_temp, dominant_condition, reading_count, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&summary.city)
    .bind(summary.date)
    .bind(summary.avg_temp)
    .bind(summary.max_temp)
    .bind(summary.min_temp)
    .bind(&summary.dominant_condition)
    .bind(summary.reading_count)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// List summaries, newest first, optionally filtered by city and/or date.
pub async fn list_summaries(
    pool: &SqlitePool,
    filter: &SummaryFilter,
) -> Result<Vec<SummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, SummaryRow>(
        "SELECT id, city, date, avg_temp, max_temp, min_temp, dominant_condition,
                reading_count, created_at
         FROM weather_summary
         WHERE (?1 IS NULL OR city = ?1)
           AND (?2 IS NULL OR date = ?2)
         ORDER BY id DESC
         LIMIT ?3",
    )
    .bind(filter.city.as_deref())
    .bind(filter.date)
    .bind(filter.limit)
    .fetch_all(pool)
    .await
}

/// Get a single summary by id.
pub async fn get_summary(pool: &SqlitePool, id: i64) -> Result<Option<SummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, SummaryRow>(
        "SELECT id, city, date, avg_temp, max_temp, min_temp, dominant_condition,
                reading_count, created_at
         FROM weather_summary WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
