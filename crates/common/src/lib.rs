//! Identifiers shared by every crate of the checkout system.

mod reference;
mod types;

pub use reference::Reference;
pub use types::{OrderId, OrderItemId, PaymentId, ProductId, UserId};
