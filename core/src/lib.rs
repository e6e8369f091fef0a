//! Core types shared by the probes, the store and the engine.

pub mod loose;
pub mod probe;
pub mod site;
pub mod status;

pub use probe::{ProbeError, ProbeFailure, ProbeOptions, ProbeResult};
pub use site::*;
pub use status::{combine, AvailabilityStatus, Reachability, Status, UnknownVariant};

use time::OffsetDateTime;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Probe target: the bare domain of a monitored site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(pub String);

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        let t = s.trim();
        let t = t
            .strip_prefix("https://")
            .or_else(|| t.strip_prefix("http://"))
            .unwrap_or(t);
        Target(t.trim_end_matches('/').to_ascii_lowercase())
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// RFC 3339 rendering of an epoch-millisecond timestamp; empty on overflow.
pub fn format_ms(ms: i64) -> String {
    use time::format_description::well_known::Rfc3339;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default()
}
