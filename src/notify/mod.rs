// Notify - Where discrepancies and fatal errors are delivered
use crate::audit::Discrepancy;
use crate::types::BlockNumber;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(String),

    #[error("Webhook returned HTTP {0}")]
    Status(u16),
}

/// Sink for audit findings
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn discrepancy(&self, discrepancy: &Discrepancy) -> Result<(), NotifyError>;

    /// Processing stopped at `height`
    async fn fatal(&self, height: BlockNumber, message: &str) -> Result<(), NotifyError>;
}

/// Reports through `tracing`
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn discrepancy(&self, discrepancy: &Discrepancy) -> Result<(), NotifyError> {
        warn!("❌ Balance mismatch: {}", discrepancy);
        Ok(())
    }

    async fn fatal(&self, height: BlockNumber, message: &str) -> Result<(), NotifyError> {
        error!("💥 Audit halted at #{}: {}", height, message);
        Ok(())
    }
}

/// Webhook payload
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Event<'a> {
    Discrepancy(&'a Discrepancy),
    Fatal { height: BlockNumber, message: &'a str },
}

/// Event stamped with the time it was sent
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    sent_at: String,
    #[serde(flatten)]
    event: &'a Event<'a>,
}

/// POSTs each event as JSON
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    async fn post(&self, event: &Event<'_>) -> Result<(), NotifyError> {
        let envelope = Envelope {
            sent_at: chrono::Utc::now().to_rfc3339(),
            event,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn discrepancy(&self, discrepancy: &Discrepancy) -> Result<(), NotifyError> {
        self.post(&Event::Discrepancy(discrepancy)).await
    }

    async fn fatal(&self, height: BlockNumber, message: &str) -> Result<(), NotifyError> {
        self.post(&Event::Fatal { height, message }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::SubjectKind;
    use crate::types::AccountId;

    #[test]
    fn test_event_payload() {
        let d = Discrepancy {
            subject: SubjectKind::Stakeholder,
            account: AccountId::from_bytes([2; 20]),
            expected: 10,
            actual: 11,
            height: 42,
            term: 1,
        };
        let json = serde_json::to_value(Event::Discrepancy(&d)).unwrap();
        assert_eq!(json["kind"], "discrepancy");
        assert_eq!(json["subject"], "stakeholder");
        assert_eq!(json["height"], 42);

        let json = serde_json::to_value(Event::Fatal {
            height: 7,
            message: "ledger underflow",
        })
        .unwrap();
        assert_eq!(json["kind"], "fatal");
        assert_eq!(json["message"], "ledger underflow");

        let event = Event::Fatal { height: 7, message: "x" };
        let json = serde_json::to_value(Envelope {
            sent_at: "2026-01-01T00:00:00+00:00".into(),
            event: &event,
        })
        .unwrap();
        assert_eq!(json["kind"], "fatal");
        assert_eq!(json["sent_at"], "2026-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let d = Discrepancy {
            subject: SubjectKind::Author,
            account: AccountId::from_bytes([3; 20]),
            expected: 1,
            actual: 2,
            height: 5,
            term: 0,
        };
        assert!(LogNotifier.discrepancy(&d).await.is_ok());
        assert!(LogNotifier.fatal(5, "boom").await.is_ok());
    }
}
