//! Rows persisted by a [`Store`](crate::Store).

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, PaymentId, ProductId, Reference};
use domain::{
    CartLine, Email, Money, OrderStatus, Owner, PaymentMethod, PaymentStatus, PlaceOrder,
    ShippingAddress,
};
use serde::Serialize;

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub owner: Owner,
    pub contact_email: Email,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub reference: Reference,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order with the unit price captured at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

impl OrderItemRecord {
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// The payment belonging to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub reference: Reference,
    pub payment_method: PaymentMethod,
    /// The most recent hosted-checkout URL issued for this payment.
    pub authorization_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order together with its items and payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
    pub payment: PaymentRecord,
}

impl OrderDetails {
    pub fn reference(&self) -> &Reference {
        &self.order.reference
    }
}

/// Everything needed to persist a new order, minus prices and stock, which
/// the store reads under its own lock.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_id: OrderId,
    pub reference: Reference,
    pub owner: Owner,
    pub contact_email: Email,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
}

impl OrderDraft {
    /// Builds a draft for a validated command under the given reference.
    pub fn new(command: &PlaceOrder, reference: Reference) -> Self {
        Self {
            order_id: OrderId::new(),
            reference,
            owner: command.owner().clone(),
            contact_email: command.contact_email().clone(),
            shipping_address: command.shipping_address().clone(),
            lines: command.lines().to_vec(),
            payment_method: command.payment_method(),
        }
    }

    /// Returns the same draft under a fresh reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = reference;
        self
    }
}

/// The result of applying a gateway outcome to a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The payment was pending and has been moved to a terminal status.
    Applied {
        payment: PaymentRecord,
        order: OrderRecord,
    },

    /// The payment was already terminal; nothing was written.
    AlreadySettled {
        payment: PaymentRecord,
        order: OrderRecord,
    },
}

impl Settlement {
    pub fn payment(&self) -> &PaymentRecord {
        match self {
            Settlement::Applied { payment, .. } | Settlement::AlreadySettled { payment, .. } => {
                payment
            }
        }
    }

    pub fn order(&self) -> &OrderRecord {
        match self {
            Settlement::Applied { order, .. } | Settlement::AlreadySettled { order, .. } => order,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Settlement::Applied { .. })
    }
}
