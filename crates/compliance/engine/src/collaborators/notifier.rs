//! Notification contract
//!
//! Delivery is send-and-forget from the engine's point of view: a send
//! reports `Delivered` or `Failed`, and transport errors surface as
//! [`NotifyError`] so the driver can retry them.

use async_trait::async_trait;
use compliance_types::Priority;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Delivery channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Chat,
    Dashboard,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Chat => write!(f, "chat"),
            Channel::Dashboard => write!(f, "dashboard"),
        }
    }
}

/// One notification payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    /// Stable across retries of the same activity
    pub idempotency_key: String,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        priority: Priority,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: String::new(),
            priority,
            idempotency_key: idempotency_key.into(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Result of one send
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed { reason: String },
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }
}

/// Transport-level notification errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification service unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

impl NotifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::Unavailable(_))
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: Channel, notification: &Notification) -> Result<DeliveryStatus, NotifyError>;
}

/// A sent notification as seen by [`InMemoryNotifier`]
#[derive(Clone, Debug, PartialEq)]
pub struct SentNotification {
    pub channel: Channel,
    pub notification: Notification,
}

/// Notifier that keeps deliveries in memory. Repeated idempotency keys
/// are acknowledged without being stored twice.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<SentNotification>>>,
    failing_channels: HashSet<Channel>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `Failed` for every send on this channel
    pub fn failing_on(mut self, channel: Channel) -> Self {
        self.failing_channels.insert(channel);
        self
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_on(&self, channel: Channel) -> usize {
        self.sent.read().await.iter().filter(|s| s.channel == channel).count()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, channel: Channel, notification: &Notification) -> Result<DeliveryStatus, NotifyError> {
        if self.failing_channels.contains(&channel) {
            tracing::warn!(channel = %channel, recipient = %notification.recipient, "Notification delivery failed");
            return Ok(DeliveryStatus::Failed {
                reason: format!("{} channel unavailable", channel),
            });
        }

        let mut sent = self.sent.write().await;
        let duplicate = sent.iter().any(|s| {
            s.channel == channel && s.notification.idempotency_key == notification.idempotency_key
        });
        if !duplicate {
            tracing::debug!(
                channel = %channel,
                recipient = %notification.recipient,
                subject = %notification.subject,
                "Notification delivered"
            );
            sent.push(SentNotification {
                channel,
                notification: notification.clone(),
            });
        }
        Ok(DeliveryStatus::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_keys_are_not_resent() {
        let notifier = InMemoryNotifier::new();
        let n = Notification::new("team@company.com", "Hello", Priority::High, "k1");
        assert!(notifier.send(Channel::Email, &n).await.unwrap().is_delivered());
        assert!(notifier.send(Channel::Email, &n).await.unwrap().is_delivered());
        assert_eq!(notifier.sent().await.len(), 1);
        // same key on another channel is a separate delivery
        notifier.send(Channel::Chat, &n).await.unwrap();
        assert_eq!(notifier.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_channel() {
        let notifier = InMemoryNotifier::new().failing_on(Channel::Chat);
        let n = Notification::new("#compliance", "Alert", Priority::Critical, "k2");
        let status = notifier.send(Channel::Chat, &n).await.unwrap();
        assert!(!status.is_delivered());
        assert_eq!(notifier.sent_on(Channel::Chat).await, 0);
    }

    #[test]
    fn test_channel_serde() {
        assert_eq!(serde_json::to_string(&Channel::Dashboard).unwrap(), "\"dashboard\"");
    }
}
