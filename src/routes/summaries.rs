//! Summary HTTP endpoints.
//!
//! - GET /api/v1/summaries?city=NAME&date=YYYY-MM-DD&limit=N
//! - GET /api/v1/summaries/:id

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::db::models::SummaryRow;
use crate::db::queries::{self, SummaryFilter};
use crate::errors::{AppError, ErrorResponse};

/// Default number of rows returned by the list endpoint.
const DEFAULT_SUMMARY_LIMIT: i64 = 100;
/// Maximum allowed value for the `limit` query parameter.
const MAX_SUMMARY_LIMIT: i64 = 1000;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Only summaries for this city (exact name)
    pub city: Option<String>,
    /// Only summaries for this calendar date (YYYY-MM-DD)
    pub date: Option<String>,
    /// Maximum number of rows (1–1000, default 100)
    pub limit: Option<i64>,
}

/// A persisted daily rollup.
#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    /// Auto-assigned row id (monotonically increasing)
    pub id: i64,
    pub city: String,
    /// Calendar date of the cycle (YYYY-MM-DD)
    pub date: String,
    /// Mean temperature in Celsius
    pub avg_temp_c: f64,
    /// Highest temperature in Celsius
    pub max_temp_c: f64,
    /// Lowest temperature in Celsius
    pub min_temp_c: f64,
    /// Most frequent weather condition (e.g. "Rain")
    pub dominant_condition: String,
    /// Number of readings folded into this row
    pub reading_count: i64,
    /// Insertion time in RFC 3339 format
    pub created_at: String,
}

impl From<SummaryRow> for SummaryResponse {
    fn from(r: SummaryRow) -> Self {
        Self {
            id: r.id,
            city: r.city,
            date: r.date.format("%Y-%m-%d").to_string(),
            avg_temp_c: r.avg_temp,
            max_temp_c: r.max_temp,
            min_temp_c: r.min_temp,
            dominant_condition: r.dominant_condition,
            reading_count: r.reading_count,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// Validate query parameters into a store filter.
fn build_filter(query: SummaryQuery) -> Result<SummaryFilter, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_SUMMARY_LIMIT);
    if !(1..=MAX_SUMMARY_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_SUMMARY_LIMIT
        )));
    }

    let date = query
        .date
        .as_deref()
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| AppError::BadRequest(format!("Invalid date (expected YYYY-MM-DD): {}", e)))?;

    let city = query.city.filter(|c| !c.trim().is_empty());

    Ok(SummaryFilter { city, date, limit })
}

/// List persisted summaries, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/summaries",
    tag = "Summaries",
    params(SummaryQuery),
    responses(
        (
            status = 200,
            description = "Matching summaries, newest first",
            body = Vec<SummaryResponse>
        ),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
    )
)]
pub async fn list_summaries(
    State(pool): State<SqlitePool>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Vec<SummaryResponse>>, AppError> {
    let filter = build_filter(query)?;
    let rows = queries::list_summaries(&pool, &filter).await?;
    Ok(Json(rows.into_iter().map(SummaryResponse::from).collect()))
}

/// Get a single summary by id.
#[utoipa::path(
    get,
    path = "/api/v1/summaries/{id}",
    tag = "Summaries",
    params(
        ("id" = i64, Path, description = "Summary row id"),
    ),
    responses(
        (status = 200, description = "The summary", body = SummaryResponse),
        (status = 404, description = "Summary not found", body = ErrorResponse),
    )
)]
pub async fn get_summary(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<Json<SummaryResponse>, AppError> {
    let row = queries::get_summary(&pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Summary {} not found", id)))?;
    Ok(Json(SummaryResponse::from(row)))
}
