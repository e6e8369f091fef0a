use sitewatch_core::SiteId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per site so that overlapping cycles for the same site
/// run one after another.
#[derive(Default)]
pub struct SiteLocks {
    inner: Mutex<HashMap<SiteId, Arc<AsyncMutex<()>>>>,
}

impl SiteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: SiteId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
