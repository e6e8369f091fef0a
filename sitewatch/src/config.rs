use anyhow::{Context, Result};
use serde::Deserialize;
use sitewatch_core::ProbeOptions;
use sitewatch_engine::EngineSettings;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG: &str = "sitewatch.yaml";
const DEFAULT_DATABASE: &str = "sitewatch.db";
const DEFAULT_CADENCE_HOURS: f64 = 6.0;
const DEFAULT_BATCH_PAUSE_MS: u64 = 2_000;
const DEFAULT_CONFIG_POLL_SECS: u64 = 60;
const API_KEY_ENV: &str = "SITEWATCH_UPTIME_API_KEY";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SecuritySection {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct IntegritySection {
    pub path: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct AvailabilitySection {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct WebhookSection {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub database: Option<PathBuf>,
    pub cadence_hours: Option<f64>,
    pub batch_pause_ms: Option<u64>,
    pub config_poll_secs: Option<u64>,
    pub security: Option<SecuritySection>,
    pub integrity: Option<IntegritySection>,
    pub availability: Option<AvailabilitySection>,
    pub webhook: Option<WebhookSection>,
}

/// Explicit path, else `./sitewatch.yaml` when present, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn cadence(&self) -> Duration {
        let hours = self.cadence_hours.filter(|h| h.is_finite() && *h > 0.0).unwrap_or(DEFAULT_CADENCE_HOURS);
        Duration::from_secs_f64(hours * 3600.0)
    }

    pub fn config_poll(&self) -> Duration {
        Duration::from_secs(self.config_poll_secs.filter(|s| *s > 0).unwrap_or(DEFAULT_CONFIG_POLL_SECS))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let d = EngineSettings::default();
        EngineSettings {
            security_timeout: secs_or(self.security.as_ref().and_then(|s| s.timeout_secs), d.security_timeout),
            integrity_timeout: secs_or(self.integrity.as_ref().and_then(|s| s.timeout_secs), d.integrity_timeout),
            availability_timeout: secs_or(self.availability.as_ref().and_then(|s| s.timeout_secs), d.availability_timeout),
            batch_pause: self.batch_pause_ms.map(Duration::from_millis).unwrap_or(Duration::from_millis(DEFAULT_BATCH_PAUSE_MS)),
        }
    }

    pub fn security_options(&self) -> (String, ProbeOptions) {
        let endpoint = self.security.as_ref().and_then(|s| s.endpoint.clone());
        (
            endpoint.unwrap_or_else(|| security_probe::DEFAULT_ENDPOINT.to_string()),
            ProbeOptions::with_timeout(self.engine_settings().security_timeout),
        )
    }

    pub fn integrity_options(&self) -> (String, ProbeOptions) {
        let path = self.integrity.as_ref().and_then(|s| s.path.clone());
        (
            path.unwrap_or_else(|| integrity_probe::DEFAULT_PATH.to_string()),
            ProbeOptions::with_timeout(self.engine_settings().integrity_timeout),
        )
    }

    /// The API key falls back to `SITEWATCH_UPTIME_API_KEY`.
    pub fn availability_options(&self) -> (String, Option<String>, ProbeOptions) {
        let section = self.availability.clone().unwrap_or_default();
        let api_key = section.api_key.or_else(|| std::env::var(API_KEY_ENV).ok());
        (
            section.endpoint.unwrap_or_else(|| availability_probe::DEFAULT_ENDPOINT.to_string()),
            api_key,
            ProbeOptions::with_timeout(self.engine_settings().availability_timeout),
        )
    }
}

fn secs_or(secs: Option<u64>, default: Duration) -> Duration {
    secs.filter(|s| *s > 0).map(Duration::from_secs).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.database_path(), PathBuf::from("sitewatch.db"));
        assert_eq!(cfg.cadence(), Duration::from_secs(6 * 3600));
        assert_eq!(cfg.config_poll(), Duration::from_secs(60));
        assert_eq!(cfg.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn overrides() {
        let cfg = parse_config(
            r#"
database: /var/lib/sitewatch/sites.db
cadence_hours: 0.5
batch_pause_ms: 250
security:
  timeout_secs: 10
availability:
  endpoint: http://127.0.0.1:9000/getMonitors
  api_key: u123
webhook:
  url: https://hooks.example.com/sitewatch
  headers:
    Authorization: Bearer abc
"#,
        )
        .unwrap();
        assert_eq!(cfg.cadence(), Duration::from_secs(1800));
        let settings = cfg.engine_settings();
        assert_eq!(settings.security_timeout, Duration::from_secs(10));
        assert_eq!(settings.integrity_timeout, Duration::from_secs(15));
        assert_eq!(settings.batch_pause, Duration::from_millis(250));
        let (endpoint, key, _) = cfg.availability_options();
        assert_eq!(endpoint, "http://127.0.0.1:9000/getMonitors");
        assert_eq!(key.as_deref(), Some("u123"));
        assert_eq!(cfg.webhook.unwrap().headers["Authorization"], "Bearer abc");
    }

    #[test]
    fn nonsense_cadence_falls_back() {
        let cfg = parse_config("cadence_hours: -3").unwrap();
        assert_eq!(cfg.cadence(), Duration::from_secs(6 * 3600));
    }

    #[test]
    fn unknown_probe_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.security_options().0, security_probe::DEFAULT_ENDPOINT);
        assert_eq!(cfg.integrity_options().0, integrity_probe::DEFAULT_PATH);
    }
}
