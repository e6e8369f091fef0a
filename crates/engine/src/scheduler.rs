//! Owned periodic trigger for automatic runs.
//!
//! At most one timer task exists per [`Scheduler`]. Stopping cancels the
//! timer and waits for it, so an in-flight run finishes its current batch
//! before `stop` returns.

use crate::pipeline::{RunOutcome, ScanEngine};
use sitewatch_core::ScanConfig;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CADENCE: Duration = Duration::from_secs(6 * 3600);
const MIN_CADENCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub cadence: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig { enabled: true, cadence: DEFAULT_CADENCE }
    }
}

impl ScheduleConfig {
    pub fn from_scan_config(cfg: &ScanConfig, cadence: Duration) -> Self {
        ScheduleConfig { enabled: cfg.enabled, cadence }
    }
}

struct Timer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    engine: ScanEngine,
    active: Option<ScheduleConfig>,
    timer: Option<Timer>,
}

impl Scheduler {
    pub fn new(engine: ScanEngine) -> Self {
        Scheduler { engine, active: None, timer: None }
    }

    /// Start the timer for `cfg`. Returns `false` when no new timer was
    /// started: scheduling is disabled or a timer is already running.
    pub fn start(&mut self, cfg: ScheduleConfig) -> bool {
        if self.timer.is_some() {
            tracing::debug!("scheduler already running");
            return false;
        }
        self.active = Some(cfg);
        if !cfg.enabled {
            tracing::info!("scheduled scanning disabled, no timer started");
            return false;
        }
        let cadence = cfg.cadence.max(MIN_CADENCE);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(timer_loop(self.engine.clone(), cadence, cancel.clone()));
        tracing::info!(cadence_secs = cadence.as_secs(), "scheduler started");
        self.timer = Some(Timer { cancel, handle });
        true
    }

    /// Cancel the timer and wait until its task has exited. The scheduler is
    /// left without an active configuration.
    pub async fn stop(&mut self) {
        self.active = None;
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
            if let Err(e) = timer.handle.await {
                tracing::error!(error = %e, "scheduler task ended abnormally");
            }
            tracing::info!("scheduler stopped");
        }
    }

    /// Apply a new configuration. Returns `false` when it matches the active
    /// one, whose timer is still alive, and nothing was touched.
    pub async fn restart(&mut self, cfg: ScheduleConfig) -> bool {
        if self.active == Some(cfg) && (self.is_running() || !cfg.enabled) {
            return false;
        }
        tracing::info!(enabled = cfg.enabled, cadence_secs = cfg.cadence.as_secs(), "schedule changed");
        self.stop().await;
        self.start(cfg);
        true
    }

    pub fn is_running(&self) -> bool {
        self.timer.as_ref().map(|t| !t.handle.is_finished()).unwrap_or(false)
    }

    pub fn config(&self) -> Option<ScheduleConfig> {
        self.active
    }
}

async fn timer_loop(engine: ScanEngine, cadence: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match engine.run_automatic(&cancel).await {
                Ok(RunOutcome::Completed(report)) => {
                    tracing::debug!(succeeded = report.succeeded, failed = report.failed, "scheduled run complete")
                }
                Ok(RunOutcome::Skipped(reason)) => tracing::debug!(?reason, "scheduled run skipped"),
                Err(e) => tracing::error!(error = %e, "scheduled run failed"),
            },
        }
    }
}
