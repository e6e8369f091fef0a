//! Shape shared by every probe adapter.

use crate::Status;
use serde::Serialize;
use std::time::Duration;

/// Why a probe did not produce a status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Timeout, refused connection or a 5xx from upstream.
    #[error("probe unavailable: {0}")]
    Unavailable(String),
    /// Upstream rejected the credential.
    #[error("probe unauthorized: {0}")]
    Unauthorized(String),
    /// Payload was absent or could not be interpreted.
    #[error("unparsable probe payload: {0}")]
    Parse(String),
    /// No credential or identifier is configured for this probe.
    #[error("probe not configured: {0}")]
    NotConfigured(String),
    /// The remote integration answered as if it were not installed.
    #[error("integration not installed: {0}")]
    NotInstalled(String),
}

impl ProbeError {
    /// Configuration problems surface as a setup hint, never as a finding.
    pub fn needs_setup(&self) -> bool {
        matches!(self, ProbeError::NotConfigured(_) | ProbeError::NotInstalled(_))
    }

    /// Transient failures keep the previously stored status for the dimension.
    pub fn keeps_previous(&self) -> bool {
        matches!(self, ProbeError::Unavailable(_) | ProbeError::Unauthorized(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Unavailable(_) => "unavailable",
            ProbeError::Unauthorized(_) => "unauthorized",
            ProbeError::Parse(_) => "parse",
            ProbeError::NotConfigured(_) => "not_configured",
            ProbeError::NotInstalled(_) => "not_installed",
        }
    }
}

/// Outcome of a single probe call. Adapters never return `Err` across the
/// orchestration boundary; failures are carried in `error`.
#[derive(Debug, Clone)]
pub struct ProbeResult<S, D> {
    pub status: S,
    pub detail: Option<D>,
    pub error: Option<ProbeError>,
    pub timestamp_ms: i64,
}

impl<S, D> ProbeResult<S, D> {
    pub fn ok(status: S, detail: D) -> Self {
        ProbeResult { status, detail: Some(detail), error: None, timestamp_ms: crate::now_ms() }
    }

    pub fn failed(status: S, error: ProbeError) -> Self {
        ProbeResult { status, detail: None, error: Some(error), timestamp_ms: crate::now_ms() }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    pub fn needs_setup(&self) -> bool {
        self.error.as_ref().map(ProbeError::needs_setup).unwrap_or(false)
    }
}

impl<D> ProbeResult<Status, D> {
    /// Status to persist for this dimension given what is currently stored.
    pub fn resolve(&self, previous: Status) -> Status {
        match &self.error {
            None => self.status,
            Some(e) if e.keeps_previous() => previous,
            Some(_) => Status::Unknown,
        }
    }
}

/// Per-call knobs every adapter accepts.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl ProbeOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        ProbeOptions { timeout, user_agent: format!("sitewatch/{}", crate::version()) }
    }
}

/// Compact, serializable summary of a probe failure kept in scan history.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeFailure {
    pub kind: &'static str,
    pub message: String,
}

impl From<&ProbeError> for ProbeFailure {
    fn from(e: &ProbeError) -> Self {
        ProbeFailure { kind: e.kind(), message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_by_error_kind() {
        let ok: ProbeResult<Status, ()> = ProbeResult::ok(Status::Warning, ());
        assert_eq!(ok.resolve(Status::Infected), Status::Warning);

        let down: ProbeResult<Status, ()> =
            ProbeResult::failed(Status::Unknown, ProbeError::Unavailable("timeout".into()));
        assert_eq!(down.resolve(Status::Infected), Status::Infected);

        let garbled: ProbeResult<Status, ()> =
            ProbeResult::failed(Status::Unknown, ProbeError::Parse("eof".into()));
        assert_eq!(garbled.resolve(Status::Clean), Status::Unknown);

        let setup: ProbeResult<Status, ()> =
            ProbeResult::failed(Status::Unknown, ProbeError::NotInstalled("404".into()));
        assert!(setup.needs_setup());
        assert_eq!(setup.resolve(Status::Clean), Status::Unknown);
    }
}
