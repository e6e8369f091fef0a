//! Notification channels.
//!
//! A notifier reports whether the alert was accepted for delivery and never
//! returns an error: delivery problems are logged by the channel itself.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use sitewatch_core::{AlertEvent, AlertKind, Site};
use std::collections::HashMap;
use std::time::Duration;

/// Everything a channel needs to render an alert.
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub event: AlertEvent,
    pub domain: String,
    pub email_target: Option<String>,
    pub message: String,
}

impl AlertContext {
    pub fn new(event: AlertEvent, site: &Site, email_target: Option<String>) -> Self {
        let message = match event.kind {
            AlertKind::Infection => format!("{} is reported infected (was {})", site.domain, event.previous_status),
            AlertKind::AvailabilityDown => format!("{} went down", site.domain),
            AlertKind::AvailabilityUp => format!("{} is back up", site.domain),
        };
        AlertContext { event, domain: site.domain.clone(), email_target, message }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// `true` when the alert was accepted for delivery.
    async fn notify(&self, kind: AlertKind, site: &Site, ctx: &AlertContext) -> bool;

    fn channel_name(&self) -> &str;
}

/// Writes alerts to the log. Always accepts.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, kind: AlertKind, site: &Site, ctx: &AlertContext) -> bool {
        tracing::warn!(
            site_id = %site.id,
            domain = %site.domain,
            kind = %kind,
            previous = %ctx.event.previous_status,
            current = %ctx.event.new_status,
            email_target = ctx.email_target.as_deref().unwrap_or("-"),
            "{}",
            ctx.message
        );
        true
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

/// Posts a JSON document to an HTTP endpoint (mail relay, chat hook, ...).
pub struct WebhookNotifier {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(WebhookNotifier { client, url: url.into(), headers })
    }

    fn format_payload(&self, kind: AlertKind, site: &Site, ctx: &AlertContext) -> serde_json::Value {
        json!({
            "source": "sitewatch",
            "version": sitewatch_core::version(),
            "alert": {
                "kind": kind.as_str(),
                "site_id": site.id,
                "domain": site.domain,
                "previous_status": ctx.event.previous_status,
                "new_status": ctx.event.new_status,
                "combined_status": site.combined_status,
                "message": ctx.message,
                "email_target": ctx.email_target,
                "timestamp": sitewatch_core::format_ms(ctx.event.timestamp_ms),
            }
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, kind: AlertKind, site: &Site, ctx: &AlertContext) -> bool {
        let mut request = self.client.post(&self.url).json(&self.format_payload(kind, site, ctx));
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        match request.send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::error!(site_id = %site.id, status = %resp.status(), "webhook rejected alert");
                false
            }
            Err(e) => {
                tracing::error!(site_id = %site.id, error = %e, "webhook delivery failed");
                false
            }
        }
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Sends through every channel concurrently; accepted if any channel accepted.
#[derive(Default)]
pub struct FanoutNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: Box<dyn Notifier>) {
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, kind: AlertKind, site: &Site, ctx: &AlertContext) -> bool {
        let sends = self.channels.iter().map(|c| async move {
            let ok = c.notify(kind, site, ctx).await;
            if ok {
                tracing::info!(channel = c.channel_name(), site_id = %site.id, kind = %kind, "alert sent");
            }
            ok
        });
        futures::future::join_all(sends).await.into_iter().any(|ok| ok)
    }

    fn channel_name(&self) -> &str {
        "fanout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch_core::{SiteId, Status};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed(bool, Arc<AtomicUsize>);

    #[async_trait]
    impl Notifier for Fixed {
        async fn notify(&self, _: AlertKind, _: &Site, _: &AlertContext) -> bool {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0
        }
        fn channel_name(&self) -> &str {
            "fixed"
        }
    }

    fn ctx(site: &Site) -> AlertContext {
        let event = AlertEvent {
            site_id: site.id,
            kind: AlertKind::Infection,
            previous_status: Status::Clean.to_string(),
            new_status: Status::Infected.to_string(),
            timestamp_ms: 0,
        };
        AlertContext::new(event, site, Some("ops@example.com".into()))
    }

    #[tokio::test]
    async fn fanout_accepts_if_any_channel_accepts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut fanout = FanoutNotifier::new();
        fanout.add_channel(Box::new(Fixed(false, calls.clone())));
        fanout.add_channel(Box::new(Fixed(true, calls.clone())));
        let site = Site::new(SiteId(1), "example.com");
        assert!(fanout.notify(AlertKind::Infection, &site, &ctx(&site)).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_fanout_rejects() {
        let site = Site::new(SiteId(1), "example.com");
        assert!(!FanoutNotifier::new().notify(AlertKind::Infection, &site, &ctx(&site)).await);
    }

    #[test]
    fn webhook_payload_shape() {
        let hook = WebhookNotifier::new("https://hooks.example.com/a", HashMap::new(), Duration::from_secs(5)).unwrap();
        let mut site = Site::new(SiteId(9), "shop.example.com");
        site.combined_status = Status::Infected;
        let payload = hook.format_payload(AlertKind::Infection, &site, &ctx(&site));
        assert_eq!(payload["source"], "sitewatch");
        assert_eq!(payload["alert"]["kind"], "infection");
        assert_eq!(payload["alert"]["site_id"], 9);
        assert_eq!(payload["alert"]["combined_status"], "infected");
        assert_eq!(payload["alert"]["email_target"], "ops@example.com");
        assert_eq!(payload["alert"]["timestamp"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn context_messages() {
        let site = Site::new(SiteId(1), "example.com");
        let mut event = ctx(&site).event;
        event.kind = AlertKind::AvailabilityDown;
        assert_eq!(AlertContext::new(event, &site, None).message, "example.com went down");
    }
}
