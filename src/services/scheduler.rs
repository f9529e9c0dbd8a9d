//! Fixed-interval cycle scheduler.
//!
//! Architecture:
//! - A timer task ticks every `interval`, first tick one full interval after
//!   `start` (no eager run)
//! - Each tick spawns the cycle as its own task holding the cycle guard; a
//!   tick that finds the guard taken is skipped, so at most one cycle is ever
//!   in flight
//! - A failing or panicking cycle is recorded in the status; the timer keeps
//!   ticking
//! - `stop` cancels the timer, then waits for an in-flight cycle to finish
//! - State is in-memory (`Arc<RwLock<SchedulerStatus>>`) and served by the
//!   status endpoint

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::cycle::{CycleReport, CycleRunner};

// ---------------------------------------------------------------------------
// Scheduler state (in-memory, shared via Arc<RwLock<>>)
// ---------------------------------------------------------------------------

/// Scheduler status, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerStatus {
    pub active: bool,
    pub interval_secs: u64,
    pub next_tick_at: Option<DateTime<Utc>>,
    pub cycle_in_progress: bool,
    pub last_cycle_completed_at: Option<DateTime<Utc>>,
    pub last_cycle_duration_ms: Option<u64>,
    pub total_cycles: u64,
    pub failed_cycles: u64,
    /// Ticks dropped because the previous cycle was still running
    pub skipped_ticks: u64,
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
}

impl SchedulerStatus {
    pub fn new() -> Self {
        Self {
            active: false,
            interval_secs: 0,
            next_tick_at: None,
            cycle_in_progress: false,
            last_cycle_completed_at: None,
            last_cycle_duration_ms: None,
            total_cycles: 0,
            failed_cycles: 0,
            skipped_ticks: 0,
            last_error: None,
            last_report: None,
        }
    }
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared scheduler status handle.
pub type SharedSchedulerStatus = Arc<RwLock<SchedulerStatus>>;

/// Handles of a running timer task.
struct RunningTimer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives a [`CycleRunner`] at a fixed interval. Stopped → Running → Stopped.
pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    status: SharedSchedulerStatus,
    cycle_guard: Arc<Mutex<()>>,
    timer: Option<RunningTimer>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CycleRunner>) -> Self {
        Self {
            runner,
            status: Arc::new(RwLock::new(SchedulerStatus::new())),
            cycle_guard: Arc::new(Mutex::new(())),
            timer: None,
        }
    }

    pub fn status(&self) -> SharedSchedulerStatus {
        self.status.clone()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Begin running cycles every `interval`. Fails if already running.
    pub async fn start(&mut self, interval: Duration) -> Result<(), AppError> {
        if self.timer.is_some() {
            return Err(AppError::Scheduler("scheduler is already running".to_string()));
        }
        if interval.is_zero() {
            return Err(AppError::Scheduler("interval must be positive".to_string()));
        }

        {
            let mut s = self.status.write().await;
            s.active = true;
            s.interval_secs = interval.as_secs();
            s.next_tick_at = Some(Utc::now() + to_chrono(interval));
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_timer(
            self.runner.clone(),
            self.status.clone(),
            self.cycle_guard.clone(),
            interval,
            shutdown_rx,
        ));
        self.timer = Some(RunningTimer { shutdown, handle });

        tracing::info!(
            "Scheduler started: running a cycle every {}s",
            interval.as_secs()
        );
        Ok(())
    }

    /// Cancel the timer and wait for an in-flight cycle to finish.
    pub async fn stop(&mut self) -> Result<(), AppError> {
        let timer = self
            .timer
            .take()
            .ok_or_else(|| AppError::Scheduler("scheduler is not running".to_string()))?;

        // A send error only means the timer task is already gone.
        let _ = timer.shutdown.send(());
        if let Err(e) = timer.handle.await {
            tracing::error!("Scheduler: timer task ended abnormally: {}", e);
        }

        if self.cycle_guard.try_lock().is_err() {
            tracing::info!("Scheduler: waiting for in-flight cycle to finish");
        }
        let _idle = self.cycle_guard.lock().await;

        {
            let mut s = self.status.write().await;
            s.active = false;
            s.next_tick_at = None;
        }
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Timer loop
// ---------------------------------------------------------------------------

async fn run_timer(
    runner: Arc<dyn CycleRunner>,
    status: SharedSchedulerStatus,
    cycle_guard: Arc<Mutex<()>>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                match cycle_guard.clone().try_lock_owned() {
                    Ok(permit) => {
                        tokio::spawn(run_guarded_cycle(runner.clone(), status.clone(), permit));
                    }
                    Err(_) => {
                        tracing::warn!("Scheduler: previous cycle still running, skipping tick");
                        status.write().await.skipped_ticks += 1;
                    }
                }
                status.write().await.next_tick_at = Some(Utc::now() + to_chrono(interval));
            }
        }
    }
}

/// Run one cycle while holding the cycle guard and record its outcome.
async fn run_guarded_cycle(
    runner: Arc<dyn CycleRunner>,
    status: SharedSchedulerStatus,
    _permit: OwnedMutexGuard<()>,
) {
    let started = Instant::now();
    status.write().await.cycle_in_progress = true;

    // Separate task so a panicking cycle surfaces as a JoinError here.
    let outcome = tokio::spawn(async move { runner.run_cycle().await }).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let mut s = status.write().await;
    s.cycle_in_progress = false;
    s.total_cycles += 1;
    s.last_cycle_completed_at = Some(Utc::now());
    s.last_cycle_duration_ms = Some(duration_ms);

    match outcome {
        Ok(Ok(report)) => {
            tracing::info!("Scheduler: cycle complete in {}ms", duration_ms);
            s.last_error = None;
            s.last_report = Some(report);
        }
        Ok(Err(e)) => {
            tracing::error!("Scheduler: cycle failed after {}ms: {}", duration_ms, e);
            s.failed_cycles += 1;
            s.last_error = Some(e.to_string());
        }
        Err(e) => {
            tracing::error!("Scheduler: cycle task aborted: {}", e);
            s.failed_cycles += 1;
            s.last_error = Some(format!("cycle task aborted: {}", e));
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
