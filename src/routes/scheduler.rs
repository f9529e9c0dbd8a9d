//! Scheduler status HTTP endpoint.
//!
//! GET /api/v1/scheduler/status: returns the current state of the cycle
//! scheduler as JSON.

use axum::extract::State;
use axum::Json;

use crate::services::scheduler::{SchedulerStatus, SharedSchedulerStatus};

/// Get the current scheduler status.
///
/// Returns timing info (interval, next tick, last completion and duration),
/// counters (cycles, failures, skipped ticks) and the last cycle's report,
/// including per-city fetch results and any alerts it raised.
#[utoipa::path(
    get,
    path = "/api/v1/scheduler/status",
    tag = "Scheduler",
    responses(
        (status = 200, description = "Current scheduler status", body = SchedulerStatus),
    )
)]
pub async fn get_scheduler_status(
    State(state): State<SharedSchedulerStatus>,
) -> Json<SchedulerStatus> {
    let s = state.read().await;
    Json(s.clone())
}
