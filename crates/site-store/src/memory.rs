use crate::{NewSite, Store, StoreError};
use sitewatch_core::{AlertConfig, ScanConfig, ScanHistoryRecord, Site, SiteId, SiteStatusUpdate};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    next_id: i64,
    sites: BTreeMap<SiteId, Site>,
    history: Vec<ScanHistoryRecord>,
    scan: ScanConfig,
    alert: AlertConfig,
}

/// Process-local store with the same semantics as [`crate::SqliteStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn register_site(&self, new: &NewSite) -> Result<SiteId, StoreError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.sites.values_mut().find(|s| s.domain == new.domain) {
            if new.integrity_key.is_some() {
                existing.integrity_key = new.integrity_key.clone();
            }
            if new.monitor_id.is_some() {
                existing.monitor_id = new.monitor_id.clone();
            }
            existing.monitoring_enabled = new.monitoring_enabled;
            return Ok(existing.id);
        }
        inner.next_id += 1;
        let id = SiteId(inner.next_id);
        let mut site = Site::new(id, new.domain.clone());
        site.integrity_key = new.integrity_key.clone();
        site.monitor_id = new.monitor_id.clone();
        site.monitoring_enabled = new.monitoring_enabled;
        inner.sites.insert(id, site);
        Ok(id)
    }

    /// Replace a whole record, e.g. to seed dedup state in tests.
    pub fn put_site(&self, site: Site) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.next_id = inner.next_id.max(site.id.0);
        inner.sites.insert(site.id, site);
        Ok(())
    }

    pub fn set_scan_config(&self, cfg: &ScanConfig) -> Result<(), StoreError> {
        self.lock()?.scan = cfg.clone();
        Ok(())
    }

    pub fn set_alert_config(&self, cfg: &AlertConfig) -> Result<(), StoreError> {
        self.lock()?.alert = cfg.clone();
        Ok(())
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().map(|i| i.history.len()).unwrap_or(0)
    }
}

impl Store for MemoryStore {
    fn sites_due_for_scan(&self) -> Result<Vec<Site>, StoreError> {
        Ok(self.all_sites()?.into_iter().filter(|s| s.monitoring_enabled).collect())
    }

    fn all_sites(&self) -> Result<Vec<Site>, StoreError> {
        let mut sites: Vec<Site> = self.lock()?.sites.values().cloned().collect();
        sites.sort_by_key(|s| (s.last_scan_ms.is_some(), s.last_scan_ms, s.id));
        Ok(sites)
    }

    fn get_site(&self, id: SiteId) -> Result<Option<Site>, StoreError> {
        Ok(self.lock()?.sites.get(&id).cloned())
    }

    fn update_site_status(&self, id: SiteId, update: &SiteStatusUpdate) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let site = inner.sites.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        site.apply(update);
        Ok(())
    }

    fn append_history(&self, record: &ScanHistoryRecord) -> Result<(), StoreError> {
        self.lock()?.history.push(record.clone());
        Ok(())
    }

    fn history(&self, id: SiteId, limit: usize) -> Result<Vec<ScanHistoryRecord>, StoreError> {
        let inner = self.lock()?;
        let mut out: Vec<ScanHistoryRecord> = inner.history.iter().filter(|r| r.site_id == id).cloned().collect();
        out.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms).then(b.record_id.cmp(&a.record_id)));
        out.truncate(limit);
        Ok(out)
    }

    fn scan_config(&self) -> Result<ScanConfig, StoreError> {
        Ok(self.lock()?.scan.clone())
    }

    fn alert_config(&self) -> Result<AlertConfig, StoreError> {
        Ok(self.lock()?.alert.clone())
    }
}
