//! Checkout services: inventory, order placement, payment initiation and
//! gateway reconciliation.
//!
//! [`CheckoutService`] wires the services together over a
//! [`Store`](store::Store) and a [`PaymentGateway`]. Customer notifications
//! go through a [`NotificationQueue`] and never block or fail a request.

pub mod aggregator;
pub mod error;
pub mod initiator;
pub mod inventory;
pub mod notifications;
pub mod reconciler;
pub mod service;
pub mod services;
pub mod webhook;

pub use aggregator::{MAX_REFERENCE_ATTEMPTS, OrderAggregator};
pub use error::{CheckoutError, ErrorCategory, Result};
pub use initiator::{OrderReceipt, PaymentInitiator};
pub use inventory::InventoryLedger;
pub use notifications::{DEFAULT_QUEUE_CAPACITY, NotificationQueue, RetryPolicy};
pub use reconciler::{GatewayReconciler, Verification, WebhookAck};
pub use service::{CheckoutService, CheckoutSettings};
pub use services::{
    CheckoutSession, GatewayError, InMemoryGateway, InMemoryNotifier, InitializeTransaction,
    LogNotifier, Notification, Notifier, NotifyError, PAYSTACK_API_BASE, PaymentGateway,
    PaystackClient, TransactionStatus,
};
pub use webhook::{SIGNATURE_HEADER, sign_payload, verify_signature};
