//! Notification channels for fired alerts.
//!
//! Delivery is best effort: a channel either accepts the message or reports
//! itself unavailable. Nothing here confirms that a user actually saw it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::error::{AppError, Result};
use crate::models::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Accepted,
    Unavailable,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<Delivery>;

    /// Permission / channel check a host may call before the first pass.
    async fn is_available(&self) -> bool;

    fn name(&self) -> &str;
}

/// Creates the process event bus. No receiver is kept, so channels report
/// unavailable until an `/events` client subscribes.
pub fn event_bus(capacity: usize) -> broadcast::Sender<String> {
    let (events_tx, _) = broadcast::channel::<String>(capacity.max(1));
    events_tx
}

/// Channels the host delivers fired alerts to: the event bus, plus a webhook
/// when one is configured.
pub fn host_notifier(
    events_tx: broadcast::Sender<String>,
    webhook_url: Option<String>,
) -> FanoutNotifier {
    let mut notifier = FanoutNotifier::new().with_channel(BroadcastNotifier::new(events_tx));
    if let Some(url) = webhook_url {
        notifier = notifier.with_channel(WebhookNotifier::new(url));
    }
    notifier
}

/// Publishes onto the process event bus (served to browsers over `/events`).
#[derive(Clone)]
pub struct BroadcastNotifier {
    events_tx: broadcast::Sender<String>,
}

impl BroadcastNotifier {
    pub const EVENT: &'static str = "alertFired";

    pub fn new(events_tx: broadcast::Sender<String>) -> Self {
        Self { events_tx }
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn send(&self, notification: &Notification) -> Result<Delivery> {
        let msg = json!({
            "event": Self::EVENT,
            "title": notification.title,
            "body": notification.body,
            "payload": notification.payload,
        });

        // Err here only means nobody is subscribed right now.
        match self.events_tx.send(msg.to_string()) {
            Ok(_) => Ok(Delivery::Accepted),
            Err(_) => Ok(Delivery::Unavailable),
        }
    }

    async fn is_available(&self) -> bool {
        self.events_tx.receiver_count() > 0
    }

    fn name(&self) -> &str {
        "broadcast"
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            http: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<Delivery> {
        let res = self.http.post(&self.url).json(notification).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Notify(format!("webhook returned {status} {body}")));
        }

        Ok(Delivery::Accepted)
    }

    async fn is_available(&self) -> bool {
        !self.url.trim().is_empty()
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Sends to every channel; accepted if any one channel accepted.
///
/// With no channels configured every send is `Unavailable`, which is how a
/// host without notification permission runs.
#[derive(Default)]
pub struct FanoutNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: impl Notifier + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send(&self, notification: &Notification) -> Result<Delivery> {
        let mut accepted = false;
        let mut last_err: Option<AppError> = None;

        for ch in &self.channels {
            match ch.send(notification).await {
                Ok(Delivery::Accepted) => accepted = true,
                Ok(Delivery::Unavailable) => {
                    tracing::debug!(channel = ch.name(), "notification channel unavailable");
                }
                Err(e) => {
                    tracing::warn!(channel = ch.name(), "notification channel failed: {}", e);
                    last_err = Some(e);
                }
            }
        }

        match (accepted, last_err) {
            (true, _) => Ok(Delivery::Accepted),
            (false, Some(e)) => Err(e),
            (false, None) => Ok(Delivery::Unavailable),
        }
    }

    async fn is_available(&self) -> bool {
        for ch in &self.channels {
            if ch.is_available().await {
                return true;
            }
        }
        false
    }

    fn name(&self) -> &str {
        "fanout"
    }
}
