//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::Reference;
use domain::PaymentOutcome;
use thiserror::Error;

/// Errors returned by a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The gateway could not be reached.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway did not answer in time.
    #[error("Payment gateway timed out")]
    Timeout,

    /// The gateway answered with an error.
    #[error("Payment gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The gateway answered with something we cannot read.
    #[error("Invalid payment gateway response: {0}")]
    InvalidResponse(String),

    #[error("Invalid payment gateway configuration: {0}")]
    InvalidConfig(String),
}

/// Request for a hosted-checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeTransaction {
    pub email: String,
    /// Amount in the gateway's minor unit (kobo).
    pub amount_minor: i64,
    pub reference: Reference,
    pub callback_url: String,
}

/// A hosted-checkout session opened by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub access_code: Option<String>,
    pub reference: Reference,
}

/// The gateway's authoritative view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    /// Raw gateway status, e.g. `success`, `failed`, `abandoned`.
    pub status: String,
    pub amount_minor: i64,
    pub reference: Reference,
}

impl TransactionStatus {
    /// Only an explicit `success` counts as paid.
    pub fn outcome(&self) -> PaymentOutcome {
        if self.status.eq_ignore_ascii_case("success") {
            PaymentOutcome::Success
        } else {
            PaymentOutcome::Failed
        }
    }
}

/// Trait for the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted-checkout session for a reference.
    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Asks the gateway for the current status of a transaction.
    async fn verify_transaction(
        &self,
        reference: &Reference,
    ) -> Result<TransactionStatus, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: HashMap<Reference, InitializeTransaction>,
    statuses: HashMap<Reference, String>,
    reported_amounts: HashMap<Reference, i64>,
    fail_on_initialize: bool,
    fail_on_verify: bool,
    verify_delay: Option<Duration>,
    initialize_calls: usize,
    verify_calls: usize,
}

/// In-memory payment gateway for testing.
///
/// Transactions report `abandoned` until a status is set with
/// [`InMemoryGateway::set_transaction_status`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryGatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryGatewayState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to refuse new checkout sessions.
    pub fn set_fail_on_initialize(&self, fail: bool) {
        self.write().fail_on_initialize = fail;
    }

    /// Configures the gateway to be unreachable for verification.
    pub fn set_fail_on_verify(&self, fail: bool) {
        self.write().fail_on_verify = fail;
    }

    /// Delays every verification answer.
    pub fn set_verify_delay(&self, delay: Option<Duration>) {
        self.write().verify_delay = delay;
    }

    /// Sets the status verification reports for a reference.
    pub fn set_transaction_status(&self, reference: &Reference, status: &str) {
        self.write()
            .statuses
            .insert(reference.clone(), status.to_string());
    }

    /// Overrides the amount verification reports for a reference.
    pub fn set_reported_amount(&self, reference: &Reference, amount_minor: i64) {
        self.write()
            .reported_amounts
            .insert(reference.clone(), amount_minor);
    }

    /// Returns the last session request made for a reference.
    pub fn session(&self, reference: &Reference) -> Option<InitializeTransaction> {
        self.read().sessions.get(reference).cloned()
    }

    /// Returns the number of initialize calls, including failed ones.
    pub fn initialize_calls(&self) -> usize {
        self.read().initialize_calls
    }

    /// Returns the number of verify calls, including failed ones.
    pub fn verify_calls(&self) -> usize {
        self.read().verify_calls
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.write();
        state.initialize_calls += 1;

        if state.fail_on_initialize {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }

        let access_code = format!("ac_{:04}", state.initialize_calls);
        let session = CheckoutSession {
            authorization_url: format!("https://checkout.example/{access_code}"),
            access_code: Some(access_code),
            reference: request.reference.clone(),
        };
        state.sessions.insert(request.reference.clone(), request);
        Ok(session)
    }

    async fn verify_transaction(
        &self,
        reference: &Reference,
    ) -> Result<TransactionStatus, GatewayError> {
        let delay = {
            let mut state = self.write();
            state.verify_calls += 1;
            state.verify_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.read();
        if state.fail_on_verify {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        let session = state
            .sessions
            .get(reference)
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                body: "Transaction reference not found".to_string(),
            })?;

        Ok(TransactionStatus {
            status: state
                .statuses
                .get(reference)
                .cloned()
                .unwrap_or_else(|| "abandoned".to_string()),
            amount_minor: state
                .reported_amounts
                .get(reference)
                .copied()
                .unwrap_or(session.amount_minor),
            reference: reference.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reference: &Reference) -> InitializeTransaction {
        InitializeTransaction {
            email: "a@b.com".to_string(),
            amount_minor: 200_000,
            reference: reference.clone(),
            callback_url: "http://localhost/cb".to_string(),
        }
    }

    #[tokio::test]
    async fn test_initialize_and_verify() {
        let gateway = InMemoryGateway::new();
        let reference = Reference::generate();

        let session = gateway
            .initialize_transaction(request(&reference))
            .await
            .unwrap();
        assert!(session.authorization_url.starts_with("https://"));
        assert_eq!(session.reference, reference);

        let status = gateway.verify_transaction(&reference).await.unwrap();
        assert_eq!(status.status, "abandoned");
        assert_eq!(status.outcome(), PaymentOutcome::Failed);

        gateway.set_transaction_status(&reference, "success");
        let status = gateway.verify_transaction(&reference).await.unwrap();
        assert_eq!(status.outcome(), PaymentOutcome::Success);
        assert_eq!(status.amount_minor, 200_000);
        assert_eq!(gateway.verify_calls(), 2);
    }

    #[tokio::test]
    async fn test_fail_on_initialize() {
        let gateway = InMemoryGateway::new();
        gateway.set_fail_on_initialize(true);

        let result = gateway
            .initialize_transaction(request(&Reference::generate()))
            .await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert_eq!(gateway.initialize_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_rejected() {
        let gateway = InMemoryGateway::new();
        let result = gateway.verify_transaction(&Reference::generate()).await;
        assert!(matches!(
            result,
            Err(GatewayError::Rejected { status: 404, .. })
        ));
    }
}
