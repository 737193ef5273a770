//! Payment initiation: opening hosted-checkout sessions for pending orders.

use common::Reference;
use domain::PaymentStatus;
use store::{OrderDetails, Store};

use crate::error::{CheckoutError, Result};
use crate::services::{InitializeTransaction, PaymentGateway};

/// An order with an open checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub details: OrderDetails,
    /// Where the customer completes payment.
    pub payment_url: String,
}

impl OrderReceipt {
    pub fn reference(&self) -> &Reference {
        self.details.reference()
    }
}

/// Opens gateway checkout sessions for orders awaiting payment.
#[derive(Clone)]
pub struct PaymentInitiator<S, G> {
    store: S,
    gateway: G,
    callback_url: String,
}

impl<S, G> PaymentInitiator<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    /// Creates an initiator whose sessions redirect to `callback_url`.
    pub fn new(store: S, gateway: G, callback_url: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            callback_url: callback_url.into(),
        }
    }

    /// Opens a checkout session for a freshly placed order.
    ///
    /// The gateway is asked for the payment amount in minor units. On
    /// failure nothing is rolled back: the order and its payment stay
    /// pending and the error carries the reference for [`Self::resume`].
    #[tracing::instrument(skip(self, details), fields(reference = %details.order.reference))]
    pub async fn initiate(&self, details: OrderDetails) -> Result<OrderReceipt> {
        let reference = details.order.reference.clone();
        let amount_minor = details
            .payment
            .amount
            .to_minor_units()
            .ok_or_else(|| CheckoutError::AmountOutOfRange(details.payment.amount.to_string()))?;

        let request = InitializeTransaction {
            email: details.order.contact_email.to_string(),
            amount_minor,
            reference: reference.clone(),
            callback_url: self.callback_url.clone(),
        };

        let session = match self.gateway.initialize_transaction(request).await {
            Ok(session) => session,
            Err(e) => {
                metrics::counter!("payment_sessions_failed_total").increment(1);
                tracing::warn!(error = %e, "could not open checkout session, order left pending");
                return Err(CheckoutError::PaymentGatewayUnavailable {
                    reference,
                    reason: e.to_string(),
                });
            }
        };

        let payment = self
            .store
            .record_checkout_session(&reference, &session.authorization_url)
            .await?;

        metrics::counter!("payment_sessions_opened_total").increment(1);
        tracing::info!(amount_minor, "checkout session opened");

        Ok(OrderReceipt {
            details: OrderDetails {
                payment,
                ..details
            },
            payment_url: session.authorization_url,
        })
    }

    /// Re-opens a checkout session for an order still awaiting payment.
    ///
    /// Fails with `InvalidTransition` if the order or its payment has
    /// already left the pending state.
    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    pub async fn resume(&self, reference: &Reference) -> Result<OrderReceipt> {
        let details = self
            .store
            .get_order_by_reference(reference)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(reference.to_string()))?;

        if !details.order.status.awaits_payment() || details.payment.status != PaymentStatus::Pending
        {
            return Err(CheckoutError::InvalidTransition {
                reference: reference.clone(),
                status: details.order.status,
                action: "resume payment for",
            });
        }

        self.initiate(details).await
    }
}
