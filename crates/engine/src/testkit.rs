//! Scripted probes and a recording notifier for engine tests.

use crate::notify::{AlertContext, Notifier};
use crate::probes::SiteProber;
use async_trait::async_trait;
use availability_probe::{AvailabilityDetail, AvailabilityResult};
use integrity_probe::{IntegrityFindings, IntegrityResult};
use security_probe::{SecurityFindings, SecurityResult, SslState};
use sitewatch_core::{AlertKind, AvailabilityStatus, ProbeError, ProbeResult, Site, SiteId, Status, Target};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn security_findings(malware: &[&str]) -> SecurityFindings {
    SecurityFindings {
        malware: malware.iter().map(|m| m.to_string()).collect(),
        blacklisted: false,
        blacklists: Vec::new(),
        ssl: SslState::Valid,
        missing_headers: Vec::new(),
        warnings: Vec::new(),
    }
}

pub fn security(status: Status) -> SecurityResult {
    let malware: &[&str] = if status == Status::Infected { &["eval.base64.encoded"] } else { &[] };
    ProbeResult::ok(status, security_findings(malware))
}

pub fn integrity(status: Status) -> IntegrityResult {
    let findings = IntegrityFindings {
        critical_count: u64::from(status == Status::Infected),
        medium_count: u64::from(status == Status::Warning),
        infected_files: Vec::new(),
        malware_detected: false,
        files_scanned: Some(120),
    };
    ProbeResult::ok(status, findings)
}

pub fn availability(status: AvailabilityStatus) -> AvailabilityResult {
    let detail = AvailabilityDetail { monitor_id: "m1".into(), code: 2, uptime_ratio: Some(99.9), response_time_ms: Some(180) };
    ProbeResult::ok(status, detail)
}

pub fn failed<D>(error: ProbeError) -> ProbeResult<Status, D> {
    ProbeResult::failed(Status::Unknown, error)
}

/// Pops one scripted result per call; falls back to clean/up when a queue is empty.
#[derive(Default)]
pub struct ScriptedProber {
    security: Mutex<VecDeque<SecurityResult>>,
    integrity: Mutex<VecDeque<IntegrityResult>>,
    availability: Mutex<VecDeque<AvailabilityResult>>,
    pub calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, s: SecurityResult, i: IntegrityResult, a: AvailabilityResult) {
        self.security.lock().unwrap().push_back(s);
        self.integrity.lock().unwrap().push_back(i);
        self.availability.lock().unwrap().push_back(a);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SiteProber for ScriptedProber {
    async fn security(&self, _target: &Target) -> SecurityResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.security.lock().unwrap().pop_front();
        next.unwrap_or_else(|| security(Status::Clean))
    }

    async fn integrity(&self, _target: &Target, _key: Option<&str>) -> IntegrityResult {
        let next = self.integrity.lock().unwrap().pop_front();
        next.unwrap_or_else(|| integrity(Status::Clean))
    }

    async fn availability(&self, _monitor_id: Option<&str>) -> AvailabilityResult {
        let next = self.availability.lock().unwrap().pop_front();
        next.unwrap_or_else(|| availability(AvailabilityStatus::Up))
    }
}

/// Records every notification; answers with `accept`.
pub struct RecordingNotifier {
    pub accept: bool,
    pub sent: Mutex<Vec<(SiteId, AlertKind, AlertContext)>>,
}

impl RecordingNotifier {
    pub fn new(accept: bool) -> Self {
        RecordingNotifier { accept, sent: Mutex::new(Vec::new()) }
    }

    pub fn kinds(&self) -> Vec<AlertKind> {
        self.sent.lock().unwrap().iter().map(|(_, k, _)| *k).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, kind: AlertKind, site: &Site, ctx: &AlertContext) -> bool {
        self.sent.lock().unwrap().push((site.id, kind, ctx.clone()));
        self.accept
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}
