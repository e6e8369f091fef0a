//! Internal file-integrity scanner adapter.
//!
//! Queries the scanner plugin installed on the site itself. The plugin
//! answers with severity counters for its last file scan; a 404 means the
//! plugin is not installed and is reported as a setup hint.

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sitewatch_core::loose;
use sitewatch_core::{ProbeError, ProbeOptions, ProbeResult, Status, Target};

pub const DEFAULT_PATH: &str = "/wp-json/sitewatch/v1/scan";
pub const KEY_HEADER: &str = "X-Sitewatch-Key";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct Payload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "critical", deserialize_with = "loose::deserialize_count")]
    critical_count: Option<u64>,
    #[serde(default, alias = "medium", deserialize_with = "loose::deserialize_count")]
    medium_count: Option<u64>,
    #[serde(default)]
    infected_files: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "loose::deserialize_flag")]
    malware_detected: bool,
    #[serde(default, alias = "scanned_files", deserialize_with = "loose::deserialize_count")]
    files_scanned: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityFindings {
    pub critical_count: u64,
    pub medium_count: u64,
    pub infected_files: Vec<String>,
    pub malware_detected: bool,
    pub files_scanned: Option<u64>,
}

pub type IntegrityResult = ProbeResult<Status, IntegrityFindings>;

pub struct IntegrityProbe {
    client: Client,
    path: String,
}

impl IntegrityProbe {
    pub fn new(path: &str, opts: &ProbeOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(opts.user_agent.clone())
            .gzip(true)
            .build()?;
        let path = if path.starts_with('/') { path.to_string() } else { format!("/{}", path) };
        Ok(IntegrityProbe { client, path })
    }

    pub async fn probe(&self, target: &Target, key: Option<&str>) -> IntegrityResult {
        let key = match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => k,
            None => {
                return ProbeResult::failed(
                    Status::Unknown,
                    ProbeError::NotConfigured("no integrity key for site".into()),
                )
            }
        };
        match self.fetch(target, key).await {
            Ok(body) => match evaluate_body(&body) {
                Ok((status, findings)) => ProbeResult::ok(status, findings),
                Err(e) => ProbeResult::failed(Status::Unknown, e),
            },
            Err(e) => ProbeResult::failed(Status::Unknown, e),
        }
    }

    async fn fetch(&self, target: &Target, key: &str) -> Result<String, ProbeError> {
        let url = format!("https://{}{}", target.0, self.path);
        let resp = self
            .client
            .get(&url)
            .header(KEY_HEADER, key)
            .send()
            .await
            .map_err(|e| ProbeError::Unavailable(e.to_string()))?;
        if let Some(err) = classify_status(resp.status()) {
            return Err(err);
        }
        resp.text().await.map_err(|e| ProbeError::Unavailable(e.to_string()))
    }
}

/// Map a non-success HTTP status to the adapter's failure taxonomy.
pub fn classify_status(status: StatusCode) -> Option<ProbeError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => ProbeError::NotInstalled("integrity endpoint returned 404".into()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProbeError::Unauthorized(format!("integrity endpoint rejected key ({})", status))
        }
        s => ProbeError::Unavailable(format!("integrity endpoint returned {}", s)),
    })
}

pub fn evaluate_body(body: &str) -> Result<(Status, IntegrityFindings), ProbeError> {
    if body.trim().is_empty() {
        return Err(ProbeError::Parse("empty integrity response".into()));
    }
    let payload: Payload = serde_json::from_str(body).map_err(|e| ProbeError::Parse(e.to_string()))?;
    evaluate(payload)
}

fn evaluate(p: Payload) -> Result<(Status, IntegrityFindings), ProbeError> {
    let infected_files = p.infected_files.as_ref().map(loose::strings).unwrap_or_default();
    let findings = IntegrityFindings {
        critical_count: p.critical_count.unwrap_or(0),
        medium_count: p.medium_count.unwrap_or(0),
        infected_files,
        malware_detected: p.malware_detected,
        files_scanned: p.files_scanned,
    };

    let status = if findings.critical_count > 0 || findings.malware_detected || !findings.infected_files.is_empty() {
        Status::Infected
    } else if findings.medium_count > 0 {
        Status::Warning
    } else if p.status.as_deref().map(is_clean_signal).unwrap_or(false) {
        Status::Clean
    } else {
        return Err(ProbeError::Parse("no findings and no clean signal in integrity response".into()));
    };
    Ok((status, findings))
}

fn is_clean_signal(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "clean" | "ok" | "safe")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_findings_are_infected() {
        let (status, f) = evaluate_body(r#"{"status":"ok","critical_count":"2","medium_count":0}"#).unwrap();
        assert_eq!(status, Status::Infected);
        assert_eq!(f.critical_count, 2);
    }

    #[test]
    fn malware_flag_or_files_are_infected() {
        let (status, _) = evaluate_body(r#"{"malware_detected":"1"}"#).unwrap();
        assert_eq!(status, Status::Infected);
        let (status, f) = evaluate_body(r#"{"infected_files":["wp-content/uploads/x.php"]}"#).unwrap();
        assert_eq!(status, Status::Infected);
        assert_eq!(f.infected_files.len(), 1);
    }

    #[test]
    fn medium_is_warning() {
        let (status, _) = evaluate_body(r#"{"status":"clean","medium":3}"#).unwrap();
        assert_eq!(status, Status::Warning);
    }

    #[test]
    fn explicit_clean_signal() {
        for s in ["clean", "OK", "safe"] {
            let body = format!(r#"{{"status":"{}","critical_count":0,"files_scanned":1200}}"#, s);
            let (status, f) = evaluate_body(&body).unwrap();
            assert_eq!(status, Status::Clean);
            assert_eq!(f.files_scanned, Some(1200));
        }
    }

    #[test]
    fn no_signal_is_parse_failure() {
        assert!(matches!(evaluate_body(r#"{"status":"pending"}"#), Err(ProbeError::Parse(_))));
        assert!(matches!(evaluate_body(""), Err(ProbeError::Parse(_))));
        assert!(matches!(evaluate_body("not json"), Err(ProbeError::Parse(_))));
    }

    #[test]
    fn http_status_taxonomy() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(classify_status(StatusCode::NOT_FOUND).unwrap().needs_setup());
        assert!(matches!(classify_status(StatusCode::FORBIDDEN), Some(ProbeError::Unauthorized(_))));
        assert!(classify_status(StatusCode::BAD_GATEWAY).unwrap().keeps_previous());
    }

    #[tokio::test]
    async fn missing_key_needs_setup() {
        let probe = IntegrityProbe::new(DEFAULT_PATH, &ProbeOptions::with_timeout(std::time::Duration::from_secs(1))).unwrap();
        let r = probe.probe(&Target::from("example.com"), None).await;
        assert!(!r.success());
        assert!(r.needs_setup());
        assert_eq!(r.status, Status::Unknown);
    }
}
