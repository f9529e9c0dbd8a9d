//! One collection cycle: fetch every city, check thresholds, aggregate,
//! persist.
//!
//! Per-city fetch failures are isolated: a city that cannot be fetched is
//! logged, reported and left out of the rollup while the others continue.
//! Aggregation and persistence failures fail the whole cycle, and a failed
//! cycle leaves no summary rows behind.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::db::models::Summary;
use crate::db::store::SummaryStore;
use crate::errors::AppError;
use crate::services::aggregator::{aggregate, group_by_city};
use crate::services::fetcher::{Reading, ReadingFetcher};
use crate::services::threshold::{self, Alert, BreachTracker};

/// Delay before re-fetching a city after a network failure (seconds).
const FETCH_RETRY_DELAY_SECS: u64 = 5;

/// How a cycle's readings are rolled up into summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryScope {
    /// One summary per city per cycle.
    #[default]
    PerCity,
    /// One summary over the whole batch, labelled with the first reading's city.
    Batch,
}

impl FromStr for SummaryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_city" | "per-city" => Ok(SummaryScope::PerCity),
            "batch" => Ok(SummaryScope::Batch),
            other => Err(format!(
                "unknown summary scope '{}' (expected per_city or batch)",
                other
            )),
        }
    }
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub threshold_c: f64,
    pub consecutive_breaches: u32,
    pub scope: SummaryScope,
    /// Extra attempts per city after a network failure.
    pub max_retries: u32,
}

/// Outcome of fetching one city within a cycle.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CityFetchStatus {
    pub city: String,
    /// "ok" or "error: <reason>"
    pub result: String,
    pub temperature_c: Option<f64>,
    pub condition: Option<String>,
    pub attempts: u32,
}

/// What a completed cycle did.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CycleReport {
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub cities: Vec<CityFetchStatus>,
    pub alerts: Vec<Alert>,
    /// Ids of the summary rows appended by this cycle
    pub summary_ids: Vec<i64>,
}

impl CycleReport {
    pub fn failed_cities(&self) -> usize {
        self.cities.iter().filter(|c| c.result != "ok").count()
    }
}

/// Something the scheduler can run once per tick.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self) -> Result<CycleReport, AppError>;
}

/// Runs fetch → threshold → aggregate → persist for the configured cities.
pub struct CycleOrchestrator {
    fetcher: ReadingFetcher,
    store: Arc<dyn SummaryStore>,
    settings: CycleSettings,
    retry_delay: Duration,
    breaches: Mutex<BreachTracker>,
}

impl CycleOrchestrator {
    pub fn new(
        fetcher: ReadingFetcher,
        store: Arc<dyn SummaryStore>,
        settings: CycleSettings,
    ) -> Self {
        let breaches = Mutex::new(BreachTracker::new(settings.consecutive_breaches));
        Self {
            fetcher,
            store,
            settings,
            retry_delay: Duration::from_secs(FETCH_RETRY_DELAY_SECS),
            breaches,
        }
    }

    /// Run one cycle, stamping summaries with `date`.
    pub async fn run_cycle_for_date(&self, date: NaiveDate) -> Result<CycleReport, AppError> {
        let started_at = Utc::now();

        // 1. Fetch all cities concurrently; join_all keeps configuration order
        let cities = self.fetcher.cities();
        let outcomes = join_all(cities.iter().map(|c| self.fetch_with_retry(&c.name))).await;

        let mut statuses = Vec::with_capacity(cities.len());
        let mut readings = Vec::with_capacity(cities.len());
        for (city, (attempts, outcome)) in cities.iter().zip(outcomes) {
            match outcome {
                Ok(reading) => {
                    statuses.push(CityFetchStatus {
                        city: city.name.clone(),
                        result: "ok".to_string(),
                        temperature_c: Some(reading.temperature_c),
                        condition: Some(reading.condition.clone()),
                        attempts,
                    });
                    readings.push(reading);
                }
                Err(e) => {
                    tracing::warn!(
                        "Cycle: skipping {} after {} attempt(s): {}",
                        city.name,
                        attempts,
                        e
                    );
                    statuses.push(CityFetchStatus {
                        city: city.name.clone(),
                        result: format!("error: {}", e),
                        temperature_c: None,
                        condition: None,
                        attempts,
                    });
                }
            }
        }

        // 2. Threshold checks
        let alerts = self.check_thresholds(&readings).await;

        // 3. Aggregate
        let summaries = self.summarize(readings, date)?;

        // 4. Persist the whole cycle in one transaction
        let summary_ids = self.store.append_all(&summaries).await?;

        let report = CycleReport {
            date,
            started_at,
            cities: statuses,
            alerts,
            summary_ids,
        };

        tracing::info!(
            "Cycle: {} readings ({} failed), {} alert(s), {} summary row(s) stored for {}",
            report.cities.len() - report.failed_cities(),
            report.failed_cities(),
            report.alerts.len(),
            report.summary_ids.len(),
            date,
        );

        Ok(report)
    }

    /// Fetch one city, retrying network failures up to `max_retries` times.
    /// Returns the number of attempts made alongside the outcome.
    async fn fetch_with_retry(&self, city: &str) -> (u32, Result<Reading, AppError>) {
        let mut attempt = 1;
        loop {
            match self.fetcher.fetch(city).await {
                Err(e) if e.is_retryable() && attempt <= self.settings.max_retries => {
                    tracing::debug!(
                        "Cycle: fetch for {} failed (attempt {}/{}), retrying in {:?}: {}",
                        city,
                        attempt,
                        self.settings.max_retries + 1,
                        self.retry_delay,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                result => return (attempt, result),
            }
        }
    }

    async fn check_thresholds(&self, readings: &[Reading]) -> Vec<Alert> {
        let mut tracker = self.breaches.lock().await;
        let alerts: Vec<Alert> = readings
            .iter()
            .filter_map(|r| tracker.observe(r, self.settings.threshold_c))
            .collect();
        for alert in &alerts {
            threshold::emit(alert);
        }
        alerts
    }

    fn summarize(&self, readings: Vec<Reading>, date: NaiveDate) -> Result<Vec<Summary>, AppError> {
        if readings.is_empty() {
            return Err(AppError::EmptyBatch);
        }
        match self.settings.scope {
            SummaryScope::Batch => Ok(vec![aggregate(&readings, date)?]),
            SummaryScope::PerCity => group_by_city(readings)
                .iter()
                .map(|(_, group)| aggregate(group, date))
                .collect(),
        }
    }
}

#[async_trait]
impl CycleRunner for CycleOrchestrator {
    async fn run_cycle(&self) -> Result<CycleReport, AppError> {
        self.run_cycle_for_date(Local::now().date_naive()).await
    }
}
