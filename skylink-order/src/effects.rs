use skylink_core::sinks::{AuditSink, NotificationSink};
use skylink_shared::Notification;
use std::sync::Arc;
use tracing::warn;

/// Best-effort audit and notification calls made after a commit.
/// Failures are logged here and never reach the caller.
#[derive(Clone)]
pub struct SideEffects {
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl SideEffects {
    pub fn new(audit: Arc<dyn AuditSink>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self { audit, notifications }
    }

    pub async fn audit(&self, actor: &str, action: &str, resource: &str, details: &str) {
        if let Err(e) = self.audit.log_action(actor, action, resource, details).await {
            warn!(action, resource, error = %e, "audit record dropped");
        }
    }

    pub async fn notify(&self, notification: Notification) {
        let subject = notification.subject.clone();
        if let Err(e) = self.notifications.enqueue(notification).await {
            warn!(subject = %subject, error = %e, "notification dropped");
        }
    }
}
