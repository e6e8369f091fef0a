pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE sites (
  site_id                 INTEGER PRIMARY KEY AUTOINCREMENT,
  domain                  TEXT NOT NULL UNIQUE,
  integrity_key           TEXT,
  monitor_id              TEXT,
  monitoring_enabled      INTEGER NOT NULL DEFAULT 1,
  security_status         TEXT NOT NULL DEFAULT 'unknown',
  integrity_status        TEXT NOT NULL DEFAULT 'unknown',
  combined_status         TEXT NOT NULL DEFAULT 'unknown',
  integrity_needs_setup   INTEGER NOT NULL DEFAULT 0,
  availability_status     TEXT,
  last_known_availability TEXT CHECK (last_known_availability IN ('up','down')),
  uptime_ratio            REAL,
  response_time_ms        INTEGER,
  infection_alert_sent    INTEGER NOT NULL DEFAULT 0,
  last_scan_ms            INTEGER,
  security_detail         TEXT,
  integrity_detail        TEXT
);

CREATE TABLE scan_history (
  record_id       TEXT PRIMARY KEY,
  site_id         INTEGER NOT NULL REFERENCES sites(site_id) ON DELETE CASCADE,
  combined_status TEXT NOT NULL,
  timestamp_ms    INTEGER NOT NULL,
  detail_json     TEXT NOT NULL
);

CREATE TABLE settings (
  key             TEXT PRIMARY KEY,
  value           TEXT NOT NULL
);

CREATE INDEX idx_sites_last_scan ON sites(last_scan_ms);
CREATE INDEX idx_history_site ON scan_history(site_id, timestamp_ms);

COMMIT;
"#
;
