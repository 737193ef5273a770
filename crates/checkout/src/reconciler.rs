//! Gateway reconciliation: applying webhook events and verification results
//! to payments and orders.
//!
//! Both paths funnel into [`Store::settle_payment`], whose guarded write is
//! what makes replays and webhook/verify races safe. Side effects (the
//! "Payment Confirmed" notification) run only for the caller whose
//! transition actually applied.

use std::time::Duration;

use common::Reference;
use domain::{PaymentOutcome, PaymentStatus};
use store::{OrderRecord, PaymentRecord, Settlement, Store};

use crate::error::{CheckoutError, Result};
use crate::notifications::{self, NotificationQueue};
use crate::services::{GatewayError, PaymentGateway};
use crate::webhook::{self, WebhookEvent, WebhookKind};

/// What a webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    /// The payment moved to this status.
    Applied(PaymentStatus),
    /// The payment was already terminal with this status.
    Duplicate(PaymentStatus),
    /// The event is not one we act on.
    Ignored,
}

/// Result of verifying a payment with the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub status: PaymentStatus,
    pub order: OrderRecord,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Webhook,
    Verify,
}

impl Source {
    fn as_str(self) -> &'static str {
        match self {
            Source::Webhook => "webhook",
            Source::Verify => "verify",
        }
    }
}

/// Reconciles gateway-reported outcomes with stored payments.
#[derive(Clone)]
pub struct GatewayReconciler<S, G> {
    store: S,
    gateway: G,
    notifications: NotificationQueue,
    webhook_secret: Vec<u8>,
    verify_timeout: Duration,
}

impl<S, G> GatewayReconciler<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    pub fn new(
        store: S,
        gateway: G,
        notifications: NotificationQueue,
        webhook_secret: impl Into<Vec<u8>>,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            notifications,
            webhook_secret: webhook_secret.into(),
            verify_timeout,
        }
    }

    /// Authenticates and applies a webhook delivery.
    ///
    /// The signature is checked against the raw body before anything is
    /// parsed. A bad signature changes nothing. Without a configured secret
    /// every delivery is rejected.
    #[tracing::instrument(skip_all)]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck> {
        let authentic = !self.webhook_secret.is_empty()
            && signature
                .is_some_and(|sig| webhook::verify_signature(&self.webhook_secret, payload, sig));
        if !authentic {
            metrics::counter!("webhook_signature_failures_total").increment(1);
            tracing::warn!(
                signature_present = signature.is_some(),
                "rejected webhook with invalid signature"
            );
            return Err(CheckoutError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| CheckoutError::InvalidPayload(e.to_string()))?;
        let reference = &event.data.reference;
        tracing::debug!(event = %event.event, %reference, "webhook received");

        match event.kind() {
            WebhookKind::ChargeSuccess => {
                let payment = self
                    .store
                    .get_payment_by_reference(reference)
                    .await?
                    .ok_or_else(|| CheckoutError::PaymentNotFound(reference.clone()))?;
                let outcome = checked_outcome(&payment, PaymentOutcome::Success, event.data.amount);
                let settlement = self.settle(reference, outcome, Source::Webhook).await?;
                Ok(ack(&settlement))
            }
            WebhookKind::ChargeFailed => {
                match self
                    .settle(reference, PaymentOutcome::Failed, Source::Webhook)
                    .await
                {
                    Ok(settlement) => Ok(ack(&settlement)),
                    Err(CheckoutError::PaymentNotFound(_)) => {
                        tracing::info!(%reference, "failed charge for unknown reference ignored");
                        Ok(WebhookAck::Ignored)
                    }
                    Err(e) => Err(e),
                }
            }
            WebhookKind::Other(kind) => {
                tracing::debug!(event = %kind, "webhook event ignored");
                Ok(WebhookAck::Ignored)
            }
        }
    }

    /// Asks the gateway for the authoritative status of a payment and
    /// applies it.
    ///
    /// A payment that is already terminal is returned as stored without
    /// calling the gateway.
    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    pub async fn verify_payment(&self, reference: &Reference) -> Result<Verification> {
        let details = self
            .store
            .get_order_by_reference(reference)
            .await?
            .ok_or_else(|| CheckoutError::PaymentNotFound(reference.clone()))?;

        if details.payment.status.is_terminal() {
            return Ok(Verification {
                status: details.payment.status,
                order: details.order,
            });
        }

        let verified =
            match tokio::time::timeout(self.verify_timeout, self.gateway.verify_transaction(reference))
                .await
            {
                Ok(Ok(verified)) => verified,
                Ok(Err(GatewayError::Timeout)) | Err(_) => {
                    metrics::counter!("payment_verify_timeouts_total").increment(1);
                    tracing::warn!("payment verification timed out, payment left pending");
                    return Err(CheckoutError::GatewayTimeout(reference.clone()));
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "payment verification failed, payment left pending");
                    return Err(CheckoutError::Gateway(e));
                }
            };

        let outcome = checked_outcome(
            &details.payment,
            verified.outcome(),
            Some(verified.amount_minor),
        );
        let settlement = self.settle(reference, outcome, Source::Verify).await?;

        Ok(Verification {
            status: settlement.payment().status,
            order: settlement.order().clone(),
        })
    }

    async fn settle(
        &self,
        reference: &Reference,
        outcome: PaymentOutcome,
        source: Source,
    ) -> Result<Settlement> {
        let settlement = self.store.settle_payment(reference, outcome).await?;

        match &settlement {
            Settlement::Applied { payment, order } => {
                metrics::counter!(
                    "payment_transitions_total",
                    "source" => source.as_str(),
                    "outcome" => payment.status.as_str()
                )
                .increment(1);
                tracing::info!(
                    %reference,
                    source = source.as_str(),
                    status = %payment.status,
                    order_status = %order.status,
                    "payment settled"
                );
                if payment.status == PaymentStatus::Success {
                    self.notifications
                        .enqueue(notifications::payment_confirmed(order));
                }
            }
            Settlement::AlreadySettled { payment, .. } => {
                metrics::counter!(
                    "payment_duplicate_notifications_total",
                    "source" => source.as_str()
                )
                .increment(1);
                tracing::info!(
                    %reference,
                    source = source.as_str(),
                    status = %payment.status,
                    "payment already settled, nothing to do"
                );
            }
        }

        Ok(settlement)
    }
}

/// Downgrades a reported success to a failure when the gateway's amount does
/// not match what the payment was opened for.
fn checked_outcome(
    payment: &PaymentRecord,
    outcome: PaymentOutcome,
    reported_minor: Option<i64>,
) -> PaymentOutcome {
    if outcome != PaymentOutcome::Success {
        return outcome;
    }
    let expected = payment.amount.to_minor_units();
    match reported_minor {
        Some(reported) if Some(reported) != expected => {
            metrics::counter!("payment_amount_mismatches_total").increment(1);
            tracing::warn!(
                reference = %payment.reference,
                expected = ?expected,
                reported,
                "gateway amount does not match payment, treating as failed"
            );
            PaymentOutcome::Failed
        }
        _ => outcome,
    }
}

fn ack(settlement: &Settlement) -> WebhookAck {
    match settlement {
        Settlement::Applied { payment, .. } => WebhookAck::Applied(payment.status),
        Settlement::AlreadySettled { payment, .. } => WebhookAck::Duplicate(payment.status),
    }
}
