//! Site record, status updates, scan history and store-owned configuration.

use crate::{combine, AvailabilityStatus, Reachability, Status};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub i64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A monitored site as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    pub id: SiteId,
    pub domain: String,
    #[serde(skip_serializing)]
    pub integrity_key: Option<String>,
    pub monitor_id: Option<String>,
    pub monitoring_enabled: bool,
    pub security_status: Status,
    pub integrity_status: Status,
    pub combined_status: Status,
    pub integrity_needs_setup: bool,
    pub availability_status: Option<AvailabilityStatus>,
    pub last_known_availability: Option<Reachability>,
    pub uptime_ratio: Option<f64>,
    pub response_time_ms: Option<u64>,
    pub infection_alert_sent: bool,
    pub last_scan_ms: Option<i64>,
    pub security_detail: Option<String>,
    pub integrity_detail: Option<String>,
}

impl Site {
    /// Freshly registered site: every status unknown, no dedup state.
    pub fn new(id: SiteId, domain: impl Into<String>) -> Self {
        Site {
            id,
            domain: domain.into(),
            integrity_key: None,
            monitor_id: None,
            monitoring_enabled: true,
            security_status: Status::Unknown,
            integrity_status: Status::Unknown,
            combined_status: Status::Unknown,
            integrity_needs_setup: false,
            availability_status: None,
            last_known_availability: None,
            uptime_ratio: None,
            response_time_ms: None,
            infection_alert_sent: false,
            last_scan_ms: None,
            security_detail: None,
            integrity_detail: None,
        }
    }

    /// Apply a completed cycle's update in place. Used by stores that keep
    /// whole records (the in-memory store, tests).
    pub fn apply(&mut self, update: &SiteStatusUpdate) {
        self.security_status = update.security_status;
        self.integrity_status = update.integrity_status;
        self.combined_status = update.combined_status();
        self.integrity_needs_setup = update.integrity_needs_setup;
        if let Some(a) = &update.availability {
            self.availability_status = Some(a.status);
            self.uptime_ratio = a.uptime_ratio;
            self.response_time_ms = a.response_time_ms;
        }
        if let Some(baseline) = update.last_known_availability {
            self.last_known_availability = Some(baseline);
        }
        self.infection_alert_sent = update.infection_alert_sent;
        self.last_scan_ms = Some(update.last_scan_ms);
        if let Some(d) = &update.security_detail {
            self.security_detail = Some(d.clone());
        }
        if let Some(d) = &update.integrity_detail {
            self.integrity_detail = Some(d.clone());
        }
    }
}

/// Latest availability reading, refreshed for display on every successful probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilitySnapshot {
    pub status: AvailabilityStatus,
    pub uptime_ratio: Option<f64>,
    pub response_time_ms: Option<u64>,
}

/// Fields written at the end of one probe cycle.
///
/// The combined status is derived from the two inputs, never carried.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteStatusUpdate {
    pub security_status: Status,
    pub integrity_status: Status,
    pub integrity_needs_setup: bool,
    /// `None` leaves the stored availability reading untouched.
    pub availability: Option<AvailabilitySnapshot>,
    /// `None` leaves the comparison baseline untouched.
    pub last_known_availability: Option<Reachability>,
    pub infection_alert_sent: bool,
    pub last_scan_ms: i64,
    pub security_detail: Option<String>,
    pub integrity_detail: Option<String>,
}

impl SiteStatusUpdate {
    pub fn combined_status(&self) -> Status {
        combine(self.security_status, self.integrity_status)
    }
}

/// One completed scan cycle; append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHistoryRecord {
    pub record_id: Uuid,
    pub site_id: SiteId,
    pub combined_status: Status,
    pub timestamp_ms: i64,
    pub detail: serde_json::Value,
}

impl ScanHistoryRecord {
    pub fn new(site_id: SiteId, combined_status: Status, timestamp_ms: i64, detail: serde_json::Value) -> Self {
        ScanHistoryRecord { record_id: Uuid::now_v7(), site_id, combined_status, timestamp_ms, detail }
    }
}

/// Scan settings held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub enabled: bool,
    pub concurrency: usize,
    pub min_interval_hours: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig { enabled: true, concurrency: 3, min_interval_hours: 5.0 }
    }
}

impl ScanConfig {
    pub fn min_interval_ms(&self) -> i64 {
        (self.min_interval_hours.max(0.0) * 3_600_000.0) as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub email_target: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Infection,
    AvailabilityDown,
    AvailabilityUp,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Infection => "infection",
            AlertKind::AvailabilityDown => "availability_down",
            AlertKind::AvailabilityUp => "availability_up",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A confirmed transition that warrants a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub site_id: SiteId,
    pub kind: AlertKind,
    pub previous_status: String,
    pub new_status: String,
    pub timestamp_ms: i64,
}
