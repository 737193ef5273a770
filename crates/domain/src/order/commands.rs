//! Order commands.

use std::collections::BTreeMap;

use common::ProductId;

use crate::payment::PaymentMethod;

use super::{CartLine, Email, Identity, OrderError, Owner, ShippingAddress};

/// Command to place a new order from a cart.
///
/// A `PlaceOrder` can only be built through [`PlaceOrder::new`], so holding one
/// means the cart, address and owner have already been validated. Stock and
/// prices are checked later, against the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    lines: Vec<CartLine>,
    shipping_address: ShippingAddress,
    owner: Owner,
    contact_email: Email,
    payment_method: PaymentMethod,
}

impl PlaceOrder {
    /// Validates a checkout request.
    ///
    /// Duplicate lines for the same product are merged by summing their
    /// quantities. An authenticated identity takes precedence over a guest
    /// email; without either the request is rejected.
    pub fn new(
        lines: Vec<CartLine>,
        shipping_address: Option<ShippingAddress>,
        identity: Option<Identity>,
        guest_email: Option<&str>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
        let mut order_of_first_seen = Vec::new();
        for line in &lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }
            let entry = merged.entry(line.product_id).or_insert_with(|| {
                order_of_first_seen.push(line.product_id);
                0
            });
            *entry = entry
                .checked_add(line.quantity)
                .ok_or(OrderError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: u32::MAX,
                })?;
        }
        let lines = order_of_first_seen
            .into_iter()
            .map(|product_id| CartLine::new(product_id, merged[&product_id]))
            .collect();

        let shipping_address = shipping_address.ok_or(OrderError::MissingShippingAddress)?;
        shipping_address.validate()?;

        let (owner, contact_email) = match identity {
            Some(identity) => (
                Owner::User {
                    user_id: identity.user_id,
                },
                identity.email,
            ),
            None => {
                let raw = guest_email
                    .filter(|email| !email.trim().is_empty())
                    .ok_or(OrderError::GuestEmailRequired)?;
                let email = Email::parse(raw)?;
                (
                    Owner::Guest {
                        email: email.clone(),
                    },
                    email,
                )
            }
        };

        Ok(Self {
            lines,
            shipping_address,
            owner,
            contact_email,
            payment_method: PaymentMethod::default(),
        })
    }

    /// Sets the payment method recorded on the order's payment.
    pub fn with_payment_method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = payment_method;
        self
    }

    /// Cart lines, one per distinct product, in first-seen order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// The address payment and notification emails are sent to.
    pub fn contact_email(&self) -> &Email {
        &self.contact_email
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }
}
