//! Paystack client.
//!
//! Talks to the Paystack transaction API with the secret key as a bearer
//! token. Every response is wrapped as `{ "status": bool, "message": str,
//! "data": ... }`.

use std::time::Duration;

use async_trait::async_trait;
use common::Reference;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::gateway::{
    CheckoutSession, GatewayError, InitializeTransaction, PaymentGateway, TransactionStatus,
};

/// Default Paystack API root.
pub const PAYSTACK_API_BASE: &str = "https://api.paystack.co";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: Option<String>,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    reference: String,
}

/// HTTP client for the Paystack API.
#[derive(Debug, Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: Url,
    secret_key: String,
}

impl PaystackClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(
        base_url: &str,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::InvalidConfig(format!("base url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidConfig(format!(
                "base url '{base_url}' cannot have a path"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            secret_key: secret_key.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidConfig("base url cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{e}; body={body}")))?;
        if !envelope.status {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: envelope.message,
            });
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data".to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    #[tracing::instrument(skip(self, request), fields(reference = %request.reference))]
    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = InitializeBody {
            email: &request.email,
            amount: request.amount_minor,
            reference: request.reference.as_str(),
            callback_url: &request.callback_url,
        };

        let response = self
            .http
            .post(self.endpoint(&["transaction", "initialize"])?)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let data: InitializeData = Self::read_envelope(response).await?;

        Ok(CheckoutSession {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: Reference::new(data.reference),
        })
    }

    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    async fn verify_transaction(
        &self,
        reference: &Reference,
    ) -> Result<TransactionStatus, GatewayError> {
        let response = self
            .http
            .get(self.endpoint(&["transaction", "verify", reference.as_str()])?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport_error)?;
        let data: VerifyData = Self::read_envelope(response).await?;

        Ok(TransactionStatus {
            status: data.status,
            amount_minor: data.amount,
            reference: Reference::new(data.reference),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_segments() {
        let client =
            PaystackClient::new("https://api.paystack.co", "sk_test", Duration::from_secs(1))
                .unwrap();
        let url = client
            .endpoint(&["transaction", "verify", "order-1-abc"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.paystack.co/transaction/verify/order-1-abc"
        );

        let client = PaystackClient::new(
            "http://127.0.0.1:9000/mock/",
            "sk_test",
            Duration::from_secs(1),
        )
        .unwrap();
        let url = client.endpoint(&["transaction", "initialize"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/mock/transaction/initialize"
        );
    }

    #[test]
    fn test_reference_is_path_encoded() {
        let client =
            PaystackClient::new("https://api.paystack.co", "sk_test", Duration::from_secs(1))
                .unwrap();
        let url = client.endpoint(&["transaction", "verify", "a/b"]).unwrap();
        assert_eq!(url.path(), "/transaction/verify/a%2Fb");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = PaystackClient::new("not a url", "sk_test", Duration::from_secs(1));
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }
}
