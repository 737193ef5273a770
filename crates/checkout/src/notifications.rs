//! Queued, best-effort notification delivery.
//!
//! Services enqueue messages after their state change has committed; a
//! background worker delivers them with retry and exponential backoff. A
//! failed or dropped notification never affects the caller.

use std::time::Duration;

use store::OrderRecord;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::services::{Notification, Notifier};

/// Currency label used in customer-facing messages.
pub const CURRENCY: &str = "NGN";

/// Default capacity of the notification queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// How a failed delivery is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles after each further failure.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Wait after failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

enum Command {
    Deliver(Notification),
    Flush(oneshot::Sender<()>),
}

/// Handle for enqueueing notifications. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Deliver(n) => f.debug_tuple("Deliver").field(&n.subject).finish(),
            Command::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl NotificationQueue {
    /// Starts the delivery worker and returns a handle to its queue.
    ///
    /// The worker stops once every handle has been dropped and the queue is
    /// drained.
    pub fn spawn<N>(notifier: N, policy: RetryPolicy, capacity: usize) -> (Self, JoinHandle<()>)
    where
        N: Notifier + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(notifier, policy, receiver));
        (Self { sender }, worker)
    }

    /// Queues a notification without waiting.
    ///
    /// If the queue is full or the worker has stopped, the notification is
    /// dropped and logged.
    pub fn enqueue(&self, notification: Notification) {
        match self.sender.try_send(Command::Deliver(notification)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                metrics::counter!("notifications_failed_total", "reason" => "queue_full")
                    .increment(1);
                tracing::warn!(?command, "notification queue full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(command)) => {
                metrics::counter!("notifications_failed_total", "reason" => "queue_closed")
                    .increment(1);
                tracing::warn!(?command, "notification worker stopped, dropping message");
            }
        }
    }

    /// Waits until everything queued before this call has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_worker<N: Notifier>(
    notifier: N,
    policy: RetryPolicy,
    mut receiver: mpsc::Receiver<Command>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Deliver(notification) => deliver(&notifier, &policy, &notification).await,
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("notification worker stopped");
}

async fn deliver<N: Notifier>(notifier: &N, policy: &RetryPolicy, notification: &Notification) {
    for attempt in 1..=policy.max_attempts {
        match notifier.notify(notification).await {
            Ok(()) => {
                metrics::counter!("notifications_sent_total").increment(1);
                tracing::info!(
                    recipient = %notification.recipient,
                    subject = %notification.subject,
                    attempt,
                    "notification sent"
                );
                return;
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let backoff = policy.backoff_after(attempt);
                tracing::warn!(
                    recipient = %notification.recipient,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "notification attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                metrics::counter!("notifications_failed_total", "reason" => "delivery")
                    .increment(1);
                tracing::error!(
                    recipient = %notification.recipient,
                    subject = %notification.subject,
                    attempt,
                    error = %e,
                    "notification failed"
                );
                return;
            }
        }
    }
}

/// "Order Confirmation" message pointing the customer at the checkout page.
pub fn order_pending(order: &OrderRecord, payment_url: &str) -> Notification {
    Notification::new(
        order.contact_email.as_str(),
        "Order Confirmation",
        format!(
            "Your order #{} is pending. Complete payment at: {}",
            order.id, payment_url
        ),
    )
}

/// "Payment Confirmed" message sent once an order is paid.
pub fn payment_confirmed(order: &OrderRecord) -> Notification {
    Notification::new(
        order.contact_email.as_str(),
        "Payment Confirmed",
        format!(
            "Your payment for order #{} was successful. Amount: {CURRENCY} {}.",
            order.id, order.total_amount
        ),
    )
}
