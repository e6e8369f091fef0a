//! Site records, scan history and scan/alert settings.
//!
//! The engine only talks to the [`Store`] trait. [`SqliteStore`] is the
//! bundled implementation; [`MemoryStore`] backs tests and dry runs.

mod memory;
mod models;
mod open;
mod query;
mod schema;
mod update;

pub use memory::MemoryStore;
pub use open::SqliteStore;

use sitewatch_core::{AlertConfig, ScanConfig, ScanHistoryRecord, Site, SiteId, SiteStatusUpdate};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("site {0} not found")]
    NotFound(SiteId),
    #[error("invalid setting {key}: {value:?}")]
    InvalidSetting { key: String, value: String },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Row-scoped access to the external store.
pub trait Store: Send + Sync {
    /// Sites participating in automatic runs, least recently scanned first.
    fn sites_due_for_scan(&self) -> Result<Vec<Site>, StoreError>;
    fn all_sites(&self) -> Result<Vec<Site>, StoreError>;
    fn get_site(&self, id: SiteId) -> Result<Option<Site>, StoreError>;
    fn update_site_status(&self, id: SiteId, update: &SiteStatusUpdate) -> Result<(), StoreError>;
    fn append_history(&self, record: &ScanHistoryRecord) -> Result<(), StoreError>;
    /// Most recent records first.
    fn history(&self, id: SiteId, limit: usize) -> Result<Vec<ScanHistoryRecord>, StoreError>;
    fn scan_config(&self) -> Result<ScanConfig, StoreError>;
    fn alert_config(&self) -> Result<AlertConfig, StoreError>;
}

/// A site as registered by the owning application.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct NewSite {
    pub domain: String,
    #[serde(default)]
    pub integrity_key: Option<String>,
    #[serde(default)]
    pub monitor_id: Option<String>,
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,
}

fn default_true() -> bool {
    true
}
