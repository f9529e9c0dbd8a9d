//! GET /api/v1/cities: the configured city table.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::config::City;

/// List the monitored cities, in collection order.
#[utoipa::path(
    get,
    path = "/api/v1/cities",
    tag = "Cities",
    responses(
        (status = 200, description = "Configured cities and provider ids", body = Vec<City>),
    )
)]
pub async fn list_cities(State(cities): State<Arc<Vec<City>>>) -> Json<Vec<City>> {
    Json(cities.as_ref().clone())
}
