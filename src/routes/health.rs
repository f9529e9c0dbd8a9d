//! GET /api/v1/health: liveness of the database and the collection loop.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::services::scheduler::SharedSchedulerStatus;

/// Everything the health check inspects.
#[derive(Clone)]
pub struct HealthState {
    pub pool: SqlitePool,
    pub scheduler: SharedSchedulerStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" if any check below fails
    pub status: String,
    pub version: String,
    /// Summary database answers queries
    pub database: bool,
    /// Collection scheduler is running
    pub scheduler_active: bool,
    pub last_cycle_completed_at: Option<DateTime<Utc>>,
    /// Set when the most recent cycle failed
    pub last_cycle_error: Option<String>,
}

/// Report whether the monitor is collecting and storing data.
///
/// Always 200. The body is "degraded" when the database is unreachable, the
/// scheduler is stopped, or the most recent cycle failed.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Health of the database and scheduler", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let (scheduler_active, last_cycle_completed_at, last_cycle_error) = {
        let s = state.scheduler.read().await;
        (s.active, s.last_cycle_completed_at, s.last_error.clone())
    };

    let healthy = database && scheduler_active && last_cycle_error.is_none();
    if !healthy {
        tracing::debug!(
            "Health: degraded (database={}, scheduler_active={}, last_error={:?})",
            database,
            scheduler_active,
            last_cycle_error
        );
    }

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        scheduler_active,
        last_cycle_completed_at,
        last_cycle_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::tests::memory_pool;
    use crate::services::scheduler::SchedulerStatus;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    async fn state(status: SchedulerStatus) -> HealthState {
        HealthState {
            pool: memory_pool().await,
            scheduler: Arc::new(RwLock::new(status)),
        }
    }

    fn running() -> SchedulerStatus {
        SchedulerStatus {
            active: true,
            interval_secs: 300,
            ..SchedulerStatus::new()
        }
    }

    #[tokio::test]
    async fn test_health_ok_while_collecting() {
        let completed = Utc::now();
        let status = SchedulerStatus {
            last_cycle_completed_at: Some(completed),
            total_cycles: 1,
            ..running()
        };

        let Json(body) = health_check(State(state(status).await)).await;

        assert_eq!(body.status, "ok");
        assert!(body.database);
        assert!(body.scheduler_active);
        assert_eq!(body.last_cycle_completed_at, Some(completed));
        assert_eq!(body.last_cycle_error, None);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_health_ok_before_first_cycle() {
        let Json(body) = health_check(State(state(running()).await)).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.last_cycle_completed_at, None);
    }

    #[tokio::test]
    async fn test_health_degraded_when_pool_closed() {
        let state = state(running()).await;
        state.pool.close().await;

        let Json(body) = health_check(State(state)).await;

        assert_eq!(body.status, "degraded");
        assert!(!body.database);
        assert!(body.scheduler_active);
    }

    #[tokio::test]
    async fn test_health_degraded_when_scheduler_stopped() {
        let Json(body) = health_check(State(state(SchedulerStatus::new()).await)).await;
        assert_eq!(body.status, "degraded");
        assert!(body.database);
        assert!(!body.scheduler_active);
    }

    #[tokio::test]
    async fn test_health_degraded_after_failed_cycle() {
        let status = SchedulerStatus {
            last_cycle_completed_at: Some(Utc::now()),
            failed_cycles: 1,
            last_error: Some("Persistence error: pool timed out".to_string()),
            ..running()
        };

        let Json(body) = health_check(State(state(status).await)).await;

        assert_eq!(body.status, "degraded");
        assert_eq!(
            body.last_cycle_error.as_deref(),
            Some("Persistence error: pool timed out")
        );
    }
}
