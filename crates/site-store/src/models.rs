//! Row decoding. Flags written by older tooling may be stored as `'1'`,
//! `'true'` or `1`; they are normalized here and nowhere else.

use rusqlite::types::Value as SqlValue;
use rusqlite::Row;
use sitewatch_core::loose;
use sitewatch_core::{Site, SiteId};

pub(crate) const SITE_COLUMNS: &str = "site_id, domain, integrity_key, monitor_id, monitoring_enabled, \
     security_status, integrity_status, combined_status, integrity_needs_setup, availability_status, \
     last_known_availability, uptime_ratio, response_time_ms, infection_alert_sent, last_scan_ms, \
     security_detail, integrity_detail";

pub(crate) fn sql_flag(v: SqlValue) -> bool {
    match v {
        SqlValue::Null => false,
        SqlValue::Integer(i) => i != 0,
        SqlValue::Real(f) => f != 0.0,
        SqlValue::Text(s) => loose::flag(&serde_json::Value::String(s)),
        SqlValue::Blob(b) => !b.is_empty(),
    }
}

fn flag_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(sql_flag(row.get::<_, SqlValue>(idx)?))
}

fn opt_string(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    row.get::<_, Option<String>>(idx)
}

pub(crate) fn site_from_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    let security_status = row.get::<_, String>(5)?.parse().unwrap_or_default();
    let integrity_status = row.get::<_, String>(6)?.parse().unwrap_or_default();
    Ok(Site {
        id: SiteId(row.get(0)?),
        domain: row.get(1)?,
        integrity_key: opt_string(row, 2)?,
        monitor_id: opt_string(row, 3)?,
        monitoring_enabled: flag_at(row, 4)?,
        security_status,
        integrity_status,
        // Re-derived on read so a hand-edited row cannot break the invariant.
        combined_status: sitewatch_core::combine(security_status, integrity_status),
        integrity_needs_setup: flag_at(row, 8)?,
        availability_status: opt_string(row, 9)?.and_then(|s| s.parse().ok()),
        last_known_availability: opt_string(row, 10)?.and_then(|s| s.parse().ok()),
        uptime_ratio: row.get(11)?,
        response_time_ms: row.get::<_, Option<i64>>(12)?.and_then(|v| u64::try_from(v).ok()),
        infection_alert_sent: flag_at(row, 13)?,
        last_scan_ms: row.get(14)?,
        security_detail: opt_string(row, 15)?,
        integrity_detail: opt_string(row, 16)?,
    })
}
