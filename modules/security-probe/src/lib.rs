//! External security scanner adapter: malware, blacklist, SSL and header findings.

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use sitewatch_core::loose;
use sitewatch_core::{ProbeError, ProbeOptions, ProbeResult, Status, Target};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://sitecheck.sucuri.net/api/v3/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SslState {
    Valid,
    Invalid,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityFindings {
    pub malware: Vec<String>,
    pub blacklisted: bool,
    pub blacklists: Vec<String>,
    pub ssl: SslState,
    pub missing_headers: Vec<String>,
    /// One entry per non-empty warning bucket, `bucket: detail`.
    pub warnings: Vec<String>,
}

pub type SecurityResult = ProbeResult<Status, SecurityFindings>;

pub struct SecurityProbe {
    client: Client,
    endpoint: Url,
}

impl SecurityProbe {
    pub fn new(endpoint: &str, opts: &ProbeOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(opts.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(SecurityProbe { client, endpoint: Url::parse(endpoint)? })
    }

    pub async fn probe(&self, target: &Target) -> SecurityResult {
        match self.fetch(target).await {
            Ok(payload) => match evaluate(&payload) {
                Ok((status, findings)) => ProbeResult::ok(status, findings),
                Err(e) => ProbeResult::failed(Status::Unknown, e),
            },
            Err(e) => ProbeResult::failed(Status::Unknown, e),
        }
    }

    async fn fetch(&self, target: &Target) -> Result<Value, ProbeError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("scan", &target.0);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::Unavailable(transport_message(&e)))?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProbeError::Unauthorized(format!("scanner returned {}", status)));
        }
        if !status.is_success() {
            return Err(ProbeError::Unavailable(format!("scanner returned {}", status)));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ProbeError::Unavailable(transport_message(&e)))?;
        parse_payload(&body)
    }
}

fn transport_message(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

pub fn parse_payload(body: &str) -> Result<Value, ProbeError> {
    if body.trim().is_empty() {
        return Err(ProbeError::Parse("empty scanner response".into()));
    }
    serde_json::from_str(body).map_err(|e| ProbeError::Parse(e.to_string()))
}

/// Classify a scanner payload. Malware and blacklisting outrank warnings,
/// and warnings outrank a clean result.
pub fn evaluate(payload: &Value) -> Result<(Status, SecurityFindings), ProbeError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ProbeError::Parse("scanner payload is not an object".into()))?;
    let warnings_obj = obj.get("warnings").and_then(Value::as_object);

    let mut malware = Vec::new();
    let mut malware_flagged = false;
    let sources = [
        warnings_obj.and_then(|w| w.get("security")).and_then(|s| s.get("malware")),
        warnings_obj.and_then(|w| w.get("malware")),
        obj.get("malware"),
    ];
    for v in sources.into_iter().flatten() {
        if loose::indicator(v) {
            malware_flagged = true;
            malware.extend(loose::strings(v));
        }
    }

    let blacklists = obj.get("blacklists").map(loose::strings).unwrap_or_default();
    let blacklisted = obj.get("blacklisted").map(loose::flag).unwrap_or(false) || !blacklists.is_empty();

    let ssl = ["tls", "ssl"]
        .iter()
        .filter_map(|k| obj.get(*k).and_then(|s| s.get("valid")))
        .find(|v| !v.is_null())
        .map(|v| if loose::flag(v) { SslState::Valid } else { SslState::Invalid })
        .unwrap_or(SslState::Unknown);

    let missing_headers = obj
        .get("headers")
        .and_then(|h| h.get("missing"))
        .map(loose::strings)
        .unwrap_or_default();

    let mut warnings = Vec::new();
    if let Some(w) = warnings_obj {
        for (bucket, v) in w {
            if bucket == "malware" {
                continue;
            }
            match v.as_object() {
                Some(nested) => {
                    for (inner, iv) in nested {
                        if inner != "malware" && bucket_present(iv) {
                            warnings.push(describe(&format!("{}.{}", bucket, inner), iv));
                        }
                    }
                }
                None if bucket_present(v) => warnings.push(describe(bucket, v)),
                None => {}
            }
        }
    }
    if ssl == SslState::Invalid {
        warnings.push("ssl: certificate is not valid".to_string());
    }

    let status = if malware_flagged || blacklisted {
        Status::Infected
    } else if !warnings.is_empty() {
        Status::Warning
    } else {
        Status::Clean
    };
    malware.sort();
    malware.dedup();
    Ok((status, SecurityFindings { malware, blacklisted, blacklists, ssl, missing_headers, warnings }))
}

fn bucket_present(v: &Value) -> bool {
    loose::indicator(v) || matches!(v, Value::Bool(true))
}

fn describe(bucket: &str, v: &Value) -> String {
    let parts = loose::strings(v);
    if parts.is_empty() || matches!(v, Value::Bool(_)) {
        bucket.to_string()
    } else {
        format!("{}: {}", bucket, parts.join(", "))
    }
}
