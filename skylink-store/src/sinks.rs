use async_trait::async_trait;
use skylink_core::sinks::{AuditSink, NotificationSink, SinkError};
use skylink_shared::{AuditRecord, Notification};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::info;

/// Audit trail kept in memory and mirrored to the `audit` tracing target.
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    pub async fn actions(&self) -> Vec<String> {
        self.records.lock().await.iter().map(|r| r.action.clone()).collect()
    }
}

#[async_trait]
impl AuditSink for AuditLog {
    async fn record(&self, record: AuditRecord) -> Result<(), SinkError> {
        info!(target: "audit", "{}", record);
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// Outbound messages waiting for a dispatcher. Bounded; the oldest message is
/// dropped when full.
#[derive(Debug)]
pub struct NotificationQueue {
    pending: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Removes and returns everything queued so far.
    pub async fn drain(&self) -> Vec<Notification> {
        self.pending.lock().await.drain(..).collect()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl NotificationSink for NotificationQueue {
    async fn enqueue(&self, notification: Notification) -> Result<(), SinkError> {
        let mut pending = self.pending.lock().await;
        if pending.len() >= self.capacity {
            if let Some(dropped) = pending.pop_front() {
                tracing::warn!(notification_id = %dropped.id, "notification queue full, dropping oldest");
            }
        }
        info!(
            channel = ?notification.channel,
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification queued"
        );
        pending.push_back(notification);
        Ok(())
    }
}
