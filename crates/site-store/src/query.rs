use crate::models::{site_from_row, sql_flag, SITE_COLUMNS};
use crate::{SqliteStore, Store, StoreError};
use rusqlite::{params, OptionalExtension};
use sitewatch_core::{AlertConfig, ScanConfig, ScanHistoryRecord, Site, SiteId, SiteStatusUpdate};

impl SqliteStore {
    #[cfg(test)]
    pub(crate) fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let cnt: i64 = self.conn()?.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    fn load_sites(&self) -> Result<Vec<Site>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM sites ORDER BY last_scan_ms IS NOT NULL, last_scan_ms, site_id",
            SITE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], site_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

impl Store for SqliteStore {
    fn sites_due_for_scan(&self) -> Result<Vec<Site>, StoreError> {
        Ok(self
            .load_sites()?
            .into_iter()
            .filter(|s| s.monitoring_enabled)
            .collect())
    }

    fn all_sites(&self) -> Result<Vec<Site>, StoreError> {
        self.load_sites()
    }

    fn get_site(&self, id: SiteId) -> Result<Option<Site>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM sites WHERE site_id=?", SITE_COLUMNS);
        Ok(conn.query_row(&sql, params![id.0], site_from_row).optional()?)
    }

    fn update_site_status(&self, id: SiteId, update: &SiteStatusUpdate) -> Result<(), StoreError> {
        self.write_status(id, update)
    }

    fn append_history(&self, record: &ScanHistoryRecord) -> Result<(), StoreError> {
        self.insert_history(record)
    }

    fn history(&self, id: SiteId, limit: usize) -> Result<Vec<ScanHistoryRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT record_id, combined_status, timestamp_ms, detail_json FROM scan_history
             WHERE site_id=? ORDER BY timestamp_ms DESC, record_id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map(params![id.0, limit as i64], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (record_id, status, timestamp_ms, detail) = row?;
            out.push(ScanHistoryRecord {
                record_id: record_id.parse().map_err(|_| StoreError::Corrupt(format!("bad record id {:?}", record_id)))?,
                site_id: id,
                combined_status: status.parse().unwrap_or_default(),
                timestamp_ms,
                detail: serde_json::from_str(&detail)?,
            });
        }
        Ok(out)
    }

    fn scan_config(&self) -> Result<ScanConfig, StoreError> {
        let defaults = ScanConfig::default();
        let enabled = match self.setting("scan.enabled")? {
            Some(v) => sql_flag(rusqlite::types::Value::Text(v)),
            None => defaults.enabled,
        };
        let concurrency = match self.setting("scan.concurrency")? {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|c| *c > 0)
                .ok_or(StoreError::InvalidSetting { key: "scan.concurrency".into(), value: v })?,
            None => defaults.concurrency,
        };
        let min_interval_hours = match self.setting("scan.min_interval_hours")? {
            Some(v) => v
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|h| h.is_finite() && *h >= 0.0)
                .ok_or(StoreError::InvalidSetting { key: "scan.min_interval_hours".into(), value: v })?,
            None => defaults.min_interval_hours,
        };
        Ok(ScanConfig { enabled, concurrency, min_interval_hours })
    }

    fn alert_config(&self) -> Result<AlertConfig, StoreError> {
        Ok(AlertConfig { email_target: self.setting("alert.email_target")? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewSite;
    use sitewatch_core::{AvailabilitySnapshot, AvailabilityStatus, Reachability, Status};

    fn store_with(domains: &[&str]) -> (SqliteStore, Vec<SiteId>) {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = domains
            .iter()
            .map(|d| store.register_site(&NewSite { domain: d.to_string(), monitoring_enabled: true, ..Default::default() }).unwrap())
            .collect();
        (store, ids)
    }

    fn update(security: Status, integrity: Status, at: i64) -> SiteStatusUpdate {
        SiteStatusUpdate {
            security_status: security,
            integrity_status: integrity,
            integrity_needs_setup: false,
            availability: None,
            last_known_availability: None,
            infection_alert_sent: false,
            last_scan_ms: at,
            security_detail: None,
            integrity_detail: None,
        }
    }

    #[test]
    fn migrates_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.table_exists("sites").unwrap());
        assert!(store.table_exists("scan_history").unwrap());
        assert!(!store.table_exists("runs").unwrap());
    }

    #[test]
    fn new_site_is_unknown() {
        let (store, ids) = store_with(&["example.com"]);
        let site = store.get_site(ids[0]).unwrap().unwrap();
        assert_eq!(site.combined_status, Status::Unknown);
        assert!(!site.infection_alert_sent);
        assert_eq!(site.last_known_availability, None);
        assert!(store.get_site(SiteId(999)).unwrap().is_none());
    }

    #[test]
    fn register_is_idempotent_per_domain() {
        let (store, ids) = store_with(&["example.com"]);
        let again = store
            .register_site(&NewSite { domain: "example.com".into(), integrity_key: Some("k".into()), monitoring_enabled: true, ..Default::default() })
            .unwrap();
        assert_eq!(ids[0], again);
        assert_eq!(store.get_site(again).unwrap().unwrap().integrity_key.as_deref(), Some("k"));
    }

    #[test]
    fn update_roundtrip_derives_combined() {
        let (store, ids) = store_with(&["example.com"]);
        let mut u = update(Status::Clean, Status::Warning, 10);
        u.infection_alert_sent = true;
        u.availability = Some(AvailabilitySnapshot { status: AvailabilityStatus::SeemsDown, uptime_ratio: Some(98.5), response_time_ms: None });
        u.last_known_availability = Some(Reachability::Down);
        store.update_site_status(ids[0], &u).unwrap();

        let site = store.get_site(ids[0]).unwrap().unwrap();
        assert_eq!(site.combined_status, Status::Warning);
        assert!(site.infection_alert_sent);
        assert_eq!(site.availability_status, Some(AvailabilityStatus::SeemsDown));
        assert_eq!(site.uptime_ratio, Some(98.5));
        assert_eq!(site.last_known_availability, Some(Reachability::Down));

        // a later update without availability leaves the reading and baseline alone
        store.update_site_status(ids[0], &update(Status::Clean, Status::Clean, 20)).unwrap();
        let site = store.get_site(ids[0]).unwrap().unwrap();
        assert_eq!(site.availability_status, Some(AvailabilityStatus::SeemsDown));
        assert_eq!(site.last_known_availability, Some(Reachability::Down));
        assert_eq!(site.last_scan_ms, Some(20));
    }

    #[test]
    fn update_unknown_site_fails() {
        let (store, _) = store_with(&[]);
        let err = store.update_site_status(SiteId(7), &update(Status::Clean, Status::Clean, 1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(SiteId(7))));
    }

    #[test]
    fn legacy_text_flags_are_decoded() {
        let (store, ids) = store_with(&["example.com"]);
        store
            .conn()
            .unwrap()
            .execute("UPDATE sites SET infection_alert_sent='true', monitoring_enabled='0' WHERE site_id=?", [ids[0].0])
            .unwrap();
        let site = store.get_site(ids[0]).unwrap().unwrap();
        assert!(site.infection_alert_sent);
        assert!(!site.monitoring_enabled);
        assert!(store.sites_due_for_scan().unwrap().is_empty());
    }

    #[test]
    fn due_sites_oldest_first() {
        let (store, ids) = store_with(&["a.example", "b.example", "c.example"]);
        store.update_site_status(ids[0], &update(Status::Clean, Status::Clean, 200)).unwrap();
        store.update_site_status(ids[1], &update(Status::Clean, Status::Clean, 100)).unwrap();
        let due: Vec<SiteId> = store.sites_due_for_scan().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(due, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn history_newest_first() {
        let (store, ids) = store_with(&["example.com"]);
        for (i, status) in [Status::Clean, Status::Infected, Status::Warning].into_iter().enumerate() {
            let rec = ScanHistoryRecord::new(ids[0], status, i as i64, serde_json::json!({ "n": i }));
            store.append_history(&rec).unwrap();
        }
        let hist = store.history(ids[0], 2).unwrap();
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].combined_status, Status::Warning);
        assert_eq!(hist[1].combined_status, Status::Infected);
        assert_eq!(hist[1].detail["n"], 1);
    }

    #[test]
    fn settings_defaults_and_overrides() {
        let (store, _) = store_with(&[]);
        assert_eq!(store.scan_config().unwrap(), ScanConfig::default());
        assert_eq!(store.alert_config().unwrap().email_target, None);

        store.set_scan_config(&ScanConfig { enabled: false, concurrency: 5, min_interval_hours: 1.5 }).unwrap();
        store.set_alert_config(&AlertConfig { email_target: Some("ops@example.com".into()) }).unwrap();
        let cfg = store.scan_config().unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.concurrency, 5);
        assert_eq!(cfg.min_interval_hours, 1.5);
        assert_eq!(store.alert_config().unwrap().email_target.as_deref(), Some("ops@example.com"));

        store.set_alert_config(&AlertConfig::default()).unwrap();
        assert_eq!(store.alert_config().unwrap().email_target, None);
    }
}
