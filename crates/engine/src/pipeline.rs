//! One probe cycle per site, and the runs that drive it.
//!
//! A cycle reads the stored record, runs the three probes concurrently,
//! resolves each dimension against what was stored, derives the combined
//! status, evaluates both alert dimensions, persists the result and only then
//! sends notifications.

use crate::batch::{run_in_batches, BatchReport};
use crate::detector::DedupState;
use crate::locks::SiteLocks;
use crate::notify::{AlertContext, Notifier};
use crate::probes::SiteProber;
use crate::EngineError;
use serde::Serialize;
use serde_json::{json, Value};
use site_store::Store;
use sitewatch_core::{
    combine, now_ms, AlertEvent, AlertKind, AvailabilitySnapshot, AvailabilityStatus, ProbeError, ProbeFailure,
    ProbeResult, ScanHistoryRecord, Site, SiteId, SiteStatusUpdate, Status, Target,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub security_timeout: Duration,
    pub integrity_timeout: Duration,
    pub availability_timeout: Duration,
    pub batch_pause: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            security_timeout: Duration::from_secs(30),
            integrity_timeout: Duration::from_secs(15),
            availability_timeout: Duration::from_secs(15),
            batch_pause: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteOutcome {
    pub site_id: SiteId,
    pub combined_status: Status,
    pub alerts: Vec<AlertKind>,
    /// Alerts a channel accepted.
    pub delivered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    TooSoon { elapsed_ms: i64, floor_ms: i64 },
    NoSites,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(BatchReport),
    Skipped(SkipReason),
}

#[derive(Clone)]
pub struct ScanEngine {
    store: Arc<dyn Store>,
    prober: Arc<dyn SiteProber>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<SiteLocks>,
    settings: EngineSettings,
}

impl ScanEngine {
    pub fn new(store: Arc<dyn Store>, prober: Arc<dyn SiteProber>, notifier: Arc<dyn Notifier>, settings: EngineSettings) -> Self {
        ScanEngine { store, prober, notifier, locks: Arc::new(SiteLocks::new()), settings }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Run one full cycle for a single site.
    pub async fn scan_site(&self, id: SiteId) -> Result<SiteOutcome, EngineError> {
        let _held = self.locks.acquire(id).await;
        let site = self.store.get_site(id)?.ok_or(EngineError::SiteNotFound(id))?;
        let target = Target::from(site.domain.as_str());
        let s = &self.settings;

        let (security, integrity, availability) = tokio::join!(
            bounded(s.security_timeout, "security", Status::Unknown, self.prober.security(&target)),
            bounded(
                s.integrity_timeout,
                "integrity",
                Status::Unknown,
                self.prober.integrity(&target, site.integrity_key.as_deref())
            ),
            bounded(
                s.availability_timeout,
                "availability",
                AvailabilityStatus::Unknown,
                self.prober.availability(site.monitor_id.as_deref())
            ),
        );
        log_failure(&site, "security", &security.error);
        log_failure(&site, "integrity", &integrity.error);
        log_failure(&site, "availability", &availability.error);

        let security_status = security.resolve(site.security_status);
        let integrity_status = integrity.resolve(site.integrity_status);
        let combined = combine(security_status, integrity_status);
        let now = now_ms();

        let mut dedup = DedupState::from_site(&site);
        let mut events = Vec::new();
        if let Some(kind) = dedup.observe_infection(combined) {
            events.push(AlertEvent {
                site_id: id,
                kind,
                previous_status: site.combined_status.to_string(),
                new_status: combined.to_string(),
                timestamp_ms: now,
            });
        }

        // Transient failures keep the stored reading; any other failure shows as unknown.
        let snapshot = match &availability.error {
            Some(e) if e.keeps_previous() => None,
            Some(_) => Some(AvailabilitySnapshot {
                status: AvailabilityStatus::Unknown,
                uptime_ratio: None,
                response_time_ms: None,
            }),
            None => Some(AvailabilitySnapshot {
                status: availability.status,
                uptime_ratio: availability.detail.as_ref().and_then(|d| d.uptime_ratio),
                response_time_ms: availability.detail.as_ref().and_then(|d| d.response_time_ms),
            }),
        };
        if let Some(snap) = &snapshot {
            let baseline = dedup.last_known_availability;
            if let Some(kind) = dedup.observe_availability(snap.status) {
                events.push(AlertEvent {
                    site_id: id,
                    kind,
                    previous_status: baseline.map(|b| b.to_string()).unwrap_or_default(),
                    new_status: dedup.last_known_availability.map(|b| b.to_string()).unwrap_or_default(),
                    timestamp_ms: now,
                });
            }
        }

        let update = SiteStatusUpdate {
            security_status,
            integrity_status,
            integrity_needs_setup: integrity.needs_setup(),
            availability: snapshot,
            last_known_availability: dedup.last_known_availability,
            infection_alert_sent: dedup.infection_alert_sent,
            last_scan_ms: now,
            security_detail: security.detail.as_ref().and_then(|d| serde_json::to_string(d).ok()),
            integrity_detail: integrity.detail.as_ref().and_then(|d| serde_json::to_string(d).ok()),
        };
        self.store.update_site_status(id, &update)?;

        let detail = json!({
            "security": dimension(&security),
            "integrity": dimension(&integrity),
            "availability": dimension(&availability),
        });
        if let Err(e) = self.store.append_history(&ScanHistoryRecord::new(id, combined, now, detail)) {
            tracing::warn!(site_id = %id, error = %e, "failed to append scan history");
        }
        tracing::info!(
            site_id = %id,
            domain = %site.domain,
            security = %security_status,
            integrity = %integrity_status,
            combined = %combined,
            alerts = events.len(),
            "site scanned"
        );

        let mut updated = site;
        updated.apply(&update);
        let alerts: Vec<AlertKind> = events.iter().map(|e| e.kind).collect();
        let delivered = self.deliver(&updated, events).await;
        Ok(SiteOutcome { site_id: id, combined_status: combined, alerts, delivered })
    }

    async fn deliver(&self, site: &Site, events: Vec<AlertEvent>) -> usize {
        if events.is_empty() {
            return 0;
        }
        let email_target = match self.store.alert_config() {
            Ok(cfg) => cfg.email_target,
            Err(e) => {
                tracing::warn!(error = %e, "alert config unavailable, notifying without a target");
                None
            }
        };
        let mut delivered = 0;
        for event in events {
            let kind = event.kind;
            let ctx = AlertContext::new(event, site, email_target.clone());
            if self.notifier.notify(kind, site, &ctx).await {
                delivered += 1;
            } else {
                tracing::error!(site_id = %site.id, kind = %kind, "notification not delivered");
            }
        }
        delivered
    }

    /// Scan every registered site now, regardless of the guard and the
    /// per-site monitoring flag.
    pub async fn scan_all(&self, cancel: &CancellationToken) -> Result<BatchReport, EngineError> {
        let cfg = self.store.scan_config()?;
        let ids: Vec<SiteId> = self.store.all_sites()?.into_iter().map(|s| s.id).collect();
        tracing::info!(sites = ids.len(), concurrency = cfg.concurrency, "manual scan of all sites");
        Ok(self.scan_batches(ids, cfg.concurrency, cancel).await)
    }

    /// A cadence-triggered run: honours the enabled flag and the guard.
    pub async fn run_automatic(&self, cancel: &CancellationToken) -> Result<RunOutcome, EngineError> {
        let cfg = self.store.scan_config()?;
        if !cfg.enabled {
            tracing::info!("automatic scanning disabled");
            return Ok(RunOutcome::Skipped(SkipReason::Disabled));
        }
        let floor_ms = cfg.min_interval_ms();
        if let Some(elapsed_ms) = last_scan_guard(&self.store.all_sites()?, now_ms(), floor_ms) {
            tracing::info!(elapsed_ms, floor_ms, "last scan too recent, skipping run");
            return Ok(RunOutcome::Skipped(SkipReason::TooSoon { elapsed_ms, floor_ms }));
        }
        let due: Vec<SiteId> = self.store.sites_due_for_scan()?.into_iter().map(|s| s.id).collect();
        if due.is_empty() {
            tracing::info!("no sites due for scanning");
            return Ok(RunOutcome::Skipped(SkipReason::NoSites));
        }

        tracing::info!(sites = due.len(), concurrency = cfg.concurrency, "automatic run started");
        let report = self.scan_batches(due, cfg.concurrency, cancel).await;
        tracing::info!(
            batches = report.batch_sizes.len(),
            succeeded = report.succeeded,
            failed = report.failed,
            stopped_early = report.stopped_early,
            "automatic run finished"
        );
        Ok(RunOutcome::Completed(report))
    }

    async fn scan_batches(&self, ids: Vec<SiteId>, concurrency: usize, cancel: &CancellationToken) -> BatchReport {
        let engine = self.clone();
        run_in_batches(ids, concurrency, self.settings.batch_pause, cancel, move |id| {
            let engine = engine.clone();
            async move { engine.scan_site(id).await.map(|_| ()).map_err(|e| format!("site {}: {}", id, e)) }
        })
        .await
    }
}

/// Time since the most recent scan of any site, when that is below
/// `floor_ms`. Sites never scanned do not count.
pub fn last_scan_guard(sites: &[Site], now_ms: i64, floor_ms: i64) -> Option<i64> {
    let newest = sites.iter().filter_map(|s| s.last_scan_ms).max()?;
    let elapsed = now_ms.saturating_sub(newest).max(0);
    (elapsed < floor_ms).then_some(elapsed)
}

async fn bounded<S, D>(
    limit: Duration,
    probe: &str,
    fallback: S,
    call: impl Future<Output = ProbeResult<S, D>>,
) -> ProbeResult<S, D> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => ProbeResult::failed(fallback, ProbeError::Unavailable(format!("{} probe timed out after {:?}", probe, limit))),
    }
}

fn log_failure(site: &Site, probe: &str, error: &Option<ProbeError>) {
    match error {
        None => {}
        Some(e) if e.needs_setup() => tracing::info!(site_id = %site.id, probe, error = %e, "probe needs setup"),
        Some(e) => tracing::warn!(site_id = %site.id, probe, kind = e.kind(), error = %e, "probe failed"),
    }
}

fn dimension<S: Serialize, D: Serialize>(result: &ProbeResult<S, D>) -> Value {
    json!({
        "status": result.status,
        "detail": result.detail,
        "error": result.error.as_ref().map(ProbeFailure::from),
    })
}
