//! The three probe adapters behind one seam.

use async_trait::async_trait;
use availability_probe::{AvailabilityProbe, AvailabilityResult};
use integrity_probe::{IntegrityProbe, IntegrityResult};
use security_probe::{SecurityProbe, SecurityResult};
use sitewatch_core::{AvailabilityStatus, ProbeError, ProbeResult, Target};

#[async_trait]
pub trait SiteProber: Send + Sync {
    async fn security(&self, target: &Target) -> SecurityResult;
    async fn integrity(&self, target: &Target, key: Option<&str>) -> IntegrityResult;
    async fn availability(&self, monitor_id: Option<&str>) -> AvailabilityResult;
}

/// Production prober backed by the HTTP adapters.
pub struct HttpProbes {
    security: SecurityProbe,
    integrity: IntegrityProbe,
    availability: AvailabilityProbe,
}

impl HttpProbes {
    pub fn new(security: SecurityProbe, integrity: IntegrityProbe, availability: AvailabilityProbe) -> Self {
        HttpProbes { security, integrity, availability }
    }
}

#[async_trait]
impl SiteProber for HttpProbes {
    async fn security(&self, target: &Target) -> SecurityResult {
        self.security.probe(target).await
    }

    async fn integrity(&self, target: &Target, key: Option<&str>) -> IntegrityResult {
        self.integrity.probe(target, key).await
    }

    async fn availability(&self, monitor_id: Option<&str>) -> AvailabilityResult {
        match monitor_id.map(str::trim).filter(|m| !m.is_empty()) {
            Some(id) => self.availability.probe(id).await,
            None => ProbeResult::failed(
                AvailabilityStatus::Unknown,
                ProbeError::NotConfigured("site has no uptime monitor".into()),
            ),
        }
    }
}
