//! Fire-and-forget notifications.
//!
//! State transitions enqueue onto the [`Outbox`] and move on. A separate
//! delivery task drains the queue through a [`Transport`]; a failed delivery
//! is logged and dropped, it never reaches the code that produced it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Idempotency key for transports that can dedupe.
    pub id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, recipient: &str, subject: impl Into<String>, body: impl Into<String>) {
        let n = Notification {
            id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            subject: subject.into(),
            body: body.into(),
        };
        tracing::debug!(id = %n.id, recipient = %n.recipient, subject = %n.subject, "notification queued");
        if let Err(e) = self.tx.send(n) {
            tracing::warn!(id = %e.0.id, "notification dropped: delivery task is gone");
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, n: &Notification) -> anyhow::Result<()>;
}

/// Posts each notification as JSON to a mail relay.
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn deliver(&self, n: &Notification) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .header("Idempotency-Key", n.id.to_string())
            .json(n)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Used when no relay is configured.
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn deliver(&self, n: &Notification) -> anyhow::Result<()> {
        tracing::info!(id = %n.id, recipient = %n.recipient, subject = %n.subject, "notification (log transport)");
        Ok(())
    }
}

pub fn spawn_delivery(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    transport: Arc<dyn Transport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(n) = rx.recv().await {
            if let Err(e) = transport.deliver(&n).await {
                tracing::warn!(id = %n.id, recipient = %n.recipient, error = %e, "notification delivery failed");
            }
        }
        tracing::info!("notification outbox closed");
    })
}

#[cfg(test)]
pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
