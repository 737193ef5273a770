//! Gateway webhook, customer callback and payment verification.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use checkout::{PaymentGateway, SIGNATURE_HEADER};
use common::Reference;
use domain::PaymentStatus;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use store::{OrderRecord, Store};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub reference: Option<String>,
    /// Paystack sends the reference twice; `trxref` is the legacy name.
    pub trxref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub status: PaymentStatus,
    pub order: OrderRecord,
}

/// POST /payments/webhook: signed gateway event.
///
/// The body is taken raw: the signature covers the exact bytes sent.
pub async fn webhook<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let ack = state.checkout.handle_webhook(&body, signature).await?;
    tracing::debug!(?ack, "webhook acknowledged");
    Ok(StatusCode::OK)
}

/// GET /payments/callback?reference=...: where the gateway sends the customer.
pub async fn callback(Query(params): Query<CallbackParams>) -> Result<Redirect, ApiError> {
    let reference = params
        .reference
        .or(params.trxref)
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing payment reference".to_string()))?;
    let location = verification_path(reference.trim())
        .ok_or_else(|| ApiError::BadRequest("Invalid payment reference".to_string()))?;
    Ok(Redirect::to(&location))
}

/// `/payments/{reference}` with the reference encoded as one path segment.
fn verification_path(reference: &str) -> Option<String> {
    if matches!(reference, "." | "..") {
        return None;
    }
    let mut url = Url::parse("http://localhost/payments").ok()?;
    url.path_segments_mut().ok()?.push(reference);
    Some(url.path().to_string())
}

/// GET /payments/{reference}: verify a payment with the gateway.
#[tracing::instrument(skip(state))]
pub async fn verify<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(reference): Path<String>,
) -> Result<Json<VerificationResponse>, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let verification = state
        .checkout
        .verify_payment(&Reference::new(reference))
        .await?;
    Ok(Json(VerificationResponse {
        status: verification.status,
        order: verification.order,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_path_encodes_reference() {
        assert_eq!(
            verification_path("order-1-abc").as_deref(),
            Some("/payments/order-1-abc")
        );
        assert_eq!(
            verification_path("../admin?x=1#y").as_deref(),
            Some("/payments/..%2Fadmin%3Fx=1%23y")
        );
        assert_eq!(verification_path(".."), None);
    }
}
