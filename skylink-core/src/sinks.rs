use async_trait::async_trait;
use skylink_shared::{AuditRecord, Notification, NotificationChannel};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives one audit entry per state-changing operation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), SinkError>;

    async fn log_action(&self, actor: &str, action: &str, resource: &str, details: &str) -> Result<(), SinkError> {
        self.record(AuditRecord::new(actor, action, resource, details)).await
    }
}

/// Accepts outbound customer messages for later dispatch.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> Result<(), SinkError>;

    async fn notify(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), SinkError> {
        self.enqueue(Notification::new(channel, recipient, subject, body)).await
    }
}
