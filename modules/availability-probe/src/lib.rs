//! Uptime monitor adapter (UptimeRobot-compatible `getMonitors` API).

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use sitewatch_core::loose;
use sitewatch_core::{AvailabilityStatus, ProbeError, ProbeOptions, ProbeResult};

pub const DEFAULT_ENDPOINT: &str = "https://api.uptimerobot.com/v2/getMonitors";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityDetail {
    pub monitor_id: String,
    pub code: i64,
    /// Percentage over the last 30 days; absent on freshly created monitors.
    pub uptime_ratio: Option<f64>,
    pub response_time_ms: Option<u64>,
}

pub type AvailabilityResult = ProbeResult<AvailabilityStatus, AvailabilityDetail>;

pub struct AvailabilityProbe {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl AvailabilityProbe {
    pub fn new(endpoint: &str, api_key: Option<String>, opts: &ProbeOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(opts.user_agent.clone())
            .build()?;
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Ok(AvailabilityProbe { client, endpoint: endpoint.to_string(), api_key })
    }

    pub async fn probe(&self, monitor_id: &str) -> AvailabilityResult {
        let Some(key) = self.api_key.as_deref() else {
            return ProbeResult::failed(
                AvailabilityStatus::Unknown,
                ProbeError::NotConfigured("no uptime monitor API key".into()),
            );
        };
        let form = [
            ("api_key", key),
            ("monitors", monitor_id),
            ("format", "json"),
            ("custom_uptime_ratios", "30"),
            ("response_times", "1"),
            ("response_times_limit", "1"),
        ];
        let resp = match self.client.post(&self.endpoint).form(&form).send().await {
            Ok(r) => r,
            Err(e) => {
                return ProbeResult::failed(AvailabilityStatus::Unknown, ProbeError::Unavailable(e.to_string()))
            }
        };
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ProbeResult::failed(
                AvailabilityStatus::Unknown,
                ProbeError::Unauthorized(format!("uptime API returned {}", status)),
            );
        }
        if !status.is_success() {
            return ProbeResult::failed(
                AvailabilityStatus::Unknown,
                ProbeError::Unavailable(format!("uptime API returned {}", status)),
            );
        }
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                return ProbeResult::failed(AvailabilityStatus::Unknown, ProbeError::Unavailable(e.to_string()))
            }
        };
        match parse_monitor(&body, monitor_id) {
            Ok(detail) => ProbeResult::ok(AvailabilityStatus::from_code(detail.code), detail),
            Err(e) => ProbeResult::failed(AvailabilityStatus::Unknown, e),
        }
    }
}

/// Extract one monitor from a `getMonitors` response.
pub fn parse_monitor(body: &str, monitor_id: &str) -> Result<AvailabilityDetail, ProbeError> {
    let v: Value = serde_json::from_str(body).map_err(|e| ProbeError::Parse(e.to_string()))?;
    if v.get("stat").and_then(Value::as_str) != Some("ok") {
        let msg = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("stat is not ok");
        return Err(ProbeError::Parse(format!("uptime API error: {}", msg)));
    }
    let monitors = v
        .get("monitors")
        .and_then(Value::as_array)
        .ok_or_else(|| ProbeError::Parse("response has no monitors".into()))?;
    let m = monitors
        .iter()
        .find(|m| m.get("id").map(id_string).as_deref() == Some(monitor_id))
        .or_else(|| if monitors.len() == 1 { monitors.first() } else { None })
        .ok_or_else(|| ProbeError::Parse(format!("monitor {} not in response", monitor_id)))?;

    let code = m
        .get("status")
        .and_then(|s| loose::count(s))
        .ok_or_else(|| ProbeError::Parse("monitor has no status code".into()))? as i64;

    // Fresh monitors report "" or 0 until the first check completes.
    let uptime_ratio = m
        .get("custom_uptime_ratio")
        .and_then(|r| loose::float(r).or_else(|| r.as_str().and_then(|s| s.split('-').next()).and_then(|s| s.parse().ok())));
    let response_time_ms = m
        .get("average_response_time")
        .and_then(loose::float)
        .filter(|t| *t > 0.0)
        .map(|t| t.round() as u64);

    Ok(AvailabilityDetail { monitor_id: monitor_id.to_string(), code, uptime_ratio, response_time_ms })
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
