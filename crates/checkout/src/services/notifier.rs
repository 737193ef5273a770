//! Notifier trait and implementations.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// A message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Errors that can occur when delivering a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Delivery failed but may succeed if tried again (rate limits, outages).
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// Delivery was refused and will not succeed on retry.
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

impl NotifyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotifyError::Transient(_))
    }
}

/// Trait for delivering notifications to customers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempts a single delivery.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier that only writes deliveries to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification delivered"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    transient_failures: u32,
    reject_all: bool,
    attempts: usize,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` attempts fail with a transient error.
    pub fn set_transient_failures(&self, count: u32) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .transient_failures = count;
    }

    /// Configures the notifier to reject every delivery.
    pub fn set_reject_all(&self, reject: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .reject_all = reject;
    }

    /// Returns every notification delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    /// Returns the number of delivered notifications.
    pub fn sent_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .len()
    }

    /// Returns the number of delivery attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .attempts
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.attempts += 1;

        if state.reject_all {
            return Err(NotifyError::Rejected("mailbox unavailable".to_string()));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(NotifyError::Transient("too many emails per second".to_string()));
        }

        state.sent.push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_deliveries() {
        let notifier = InMemoryNotifier::new();
        notifier
            .notify(&Notification::new("a@b.com", "Hello", "Body"))
            .await
            .unwrap();

        assert_eq!(notifier.sent_count(), 1);
        assert_eq!(notifier.sent()[0].subject, "Hello");
    }

    #[tokio::test]
    async fn test_transient_failures_run_out() {
        let notifier = InMemoryNotifier::new();
        notifier.set_transient_failures(1);
        let message = Notification::new("a@b.com", "Hello", "Body");

        let first = notifier.notify(&message).await;
        assert!(first.as_ref().is_err_and(NotifyError::is_retryable));
        notifier.notify(&message).await.unwrap();

        assert_eq!(notifier.attempts(), 2);
        assert_eq!(notifier.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_reject_all_is_not_retryable() {
        let notifier = InMemoryNotifier::new();
        notifier.set_reject_all(true);

        let err = notifier
            .notify(&Notification::new("a@b.com", "Hello", "Body"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
