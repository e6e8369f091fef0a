//! Scan orchestration: per-site probe cycles, transition detection,
//! notification and the periodic scheduler.

pub mod batch;
pub mod detector;
pub mod locks;
pub mod notify;
pub mod pipeline;
pub mod probes;
pub mod scheduler;

#[cfg(test)]
mod testkit;

pub use batch::{run_in_batches, BatchReport};
pub use detector::DedupState;
pub use notify::{AlertContext, FanoutNotifier, LogNotifier, Notifier, WebhookNotifier};
pub use pipeline::{last_scan_guard, EngineSettings, RunOutcome, ScanEngine, SiteOutcome, SkipReason};
pub use probes::{HttpProbes, SiteProber};
pub use scheduler::{ScheduleConfig, Scheduler};

use site_store::StoreError;
use sitewatch_core::SiteId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("site {0} is not registered")]
    SiteNotFound(SiteId),
}
