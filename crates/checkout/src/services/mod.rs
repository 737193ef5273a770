//! External collaborators: the payment gateway and the notifier.

pub mod gateway;
pub mod notifier;
pub mod paystack;

pub use gateway::{
    CheckoutSession, GatewayError, InMemoryGateway, InitializeTransaction, PaymentGateway,
    TransactionStatus,
};
pub use notifier::{InMemoryNotifier, LogNotifier, Notification, Notifier, NotifyError};
pub use paystack::{PAYSTACK_API_BASE, PaystackClient};
