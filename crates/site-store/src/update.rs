use crate::{NewSite, SqliteStore, StoreError};
use rusqlite::{params, OptionalExtension};
use sitewatch_core::{AlertConfig, ScanConfig, ScanHistoryRecord, SiteId, SiteStatusUpdate};

impl SqliteStore {
    /// Insert a site, or refresh its credentials if the domain already exists.
    pub fn register_site(&self, site: &NewSite) -> Result<SiteId, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sites(domain, integrity_key, monitor_id, monitoring_enabled) VALUES (?,?,?,?)
             ON CONFLICT(domain) DO UPDATE SET integrity_key=COALESCE(excluded.integrity_key, sites.integrity_key),
               monitor_id=COALESCE(excluded.monitor_id, sites.monitor_id), monitoring_enabled=excluded.monitoring_enabled",
            params![site.domain, site.integrity_key, site.monitor_id, site.monitoring_enabled],
        )?;
        let id: i64 = conn.query_row("SELECT site_id FROM sites WHERE domain=?", params![site.domain], |r| r.get(0))?;
        Ok(SiteId(id))
    }

    pub(crate) fn write_status(&self, id: SiteId, u: &SiteStatusUpdate) -> Result<(), StoreError> {
        let (availability, uptime, response) = match &u.availability {
            Some(a) => (
                Some(a.status.as_str()),
                a.uptime_ratio,
                a.response_time_ms.and_then(|v| i64::try_from(v).ok()),
            ),
            None => (None, None, None),
        };
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sites SET security_status=?, integrity_status=?, combined_status=?, integrity_needs_setup=?,
               availability_status=COALESCE(?, availability_status),
               uptime_ratio=CASE WHEN ? IS NULL THEN uptime_ratio ELSE ? END,
               response_time_ms=CASE WHEN ? IS NULL THEN response_time_ms ELSE ? END,
               last_known_availability=COALESCE(?, last_known_availability),
               infection_alert_sent=?, last_scan_ms=?,
               security_detail=COALESCE(?, security_detail), integrity_detail=COALESCE(?, integrity_detail)
             WHERE site_id=?",
            params![
                u.security_status.as_str(),
                u.integrity_status.as_str(),
                u.combined_status().as_str(),
                u.integrity_needs_setup,
                availability,
                availability,
                uptime,
                availability,
                response,
                u.last_known_availability.map(|r| r.as_str()),
                u.infection_alert_sent,
                u.last_scan_ms,
                u.security_detail,
                u.integrity_detail,
                id.0,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub(crate) fn insert_history(&self, record: &ScanHistoryRecord) -> Result<(), StoreError> {
        let detail = serde_json::to_string(&record.detail)?;
        self.conn()?.execute(
            "INSERT INTO scan_history(record_id, site_id, combined_status, timestamp_ms, detail_json) VALUES (?,?,?,?,?)",
            params![
                record.record_id.to_string(),
                record.site_id.0,
                record.combined_status.as_str(),
                record.timestamp_ms,
                detail
            ],
        )?;
        Ok(())
    }

    pub fn set_scan_config(&self, cfg: &ScanConfig) -> Result<(), StoreError> {
        self.set_setting("scan.enabled", if cfg.enabled { "1" } else { "0" })?;
        self.set_setting("scan.concurrency", &cfg.concurrency.max(1).to_string())?;
        self.set_setting("scan.min_interval_hours", &cfg.min_interval_hours.to_string())
    }

    pub fn set_alert_config(&self, cfg: &AlertConfig) -> Result<(), StoreError> {
        match cfg.email_target.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(t) => self.set_setting("alert.email_target", t),
            None => {
                self.conn()?.execute("DELETE FROM settings WHERE key='alert.email_target'", [])?;
                Ok(())
            }
        }
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO settings(key, value) VALUES (?,?) ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub(crate) fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn()?
            .query_row("SELECT value FROM settings WHERE key=?", [key], |r| r.get(0))
            .optional()?)
    }
}
