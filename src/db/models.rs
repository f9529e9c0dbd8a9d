use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A daily rollup produced by the aggregator, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub city: String,
    pub date: NaiveDate,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
    /// Number of readings folded into this rollup.
    pub reading_count: i64,
}

/// A persisted row of the `weather_summary` table.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub id: i64,
    pub city: String,
    pub date: NaiveDate,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
    pub reading_count: i64,
    pub created_at: DateTime<Utc>,
}
