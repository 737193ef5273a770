//! Order placement, lookup, payment resumption and cancellation.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use checkout::{OrderReceipt, PaymentGateway};
use common::Reference;
use domain::{CartLine, PaymentMethod, PlaceOrder, ShippingAddress};
use serde::{Deserialize, Serialize};
use store::{OrderDetails, Store};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<CartLine>,
    pub shipping_address: Option<ShippingAddress>,
    /// Required for guests; ignored for authenticated callers.
    pub email: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub reference: Reference,
    pub payment_url: String,
    #[serde(flatten)]
    pub details: OrderDetails,
}

impl From<OrderReceipt> for CheckoutResponse {
    fn from(receipt: OrderReceipt) -> Self {
        Self {
            reference: receipt.details.order.reference.clone(),
            payment_url: receipt.payment_url,
            details: receipt.details,
        }
    }
}

// -- Handlers --

/// POST /orders: place an order and open its checkout session.
#[tracing::instrument(skip_all)]
pub async fn create<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let caller = state.auth.authenticate(&headers)?;
    let Json(req) = payload.inspect_err(|_| {
        metrics::counter!("orders_rejected_total", "reason" => "validation").increment(1);
    })?;
    let command = PlaceOrder::new(
        req.items,
        req.shipping_address,
        caller.identity(),
        req.email.as_deref(),
    )
    .inspect_err(|e| {
        metrics::counter!("orders_rejected_total", "reason" => "validation").increment(1);
        tracing::info!(error = %e, "order rejected");
    })?
    .with_payment_method(req.payment_method);

    let receipt = state.checkout.place_order(command).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// GET /orders/{reference}: order with items and payment.
pub async fn get<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Result<Json<OrderDetails>, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let reference = Reference::new(reference);
    let details = authorized_order(&state, &headers, &reference).await?;
    Ok(Json(details))
}

/// POST /orders/{reference}/payment: re-open checkout for a pending order.
#[tracing::instrument(skip(state, headers))]
pub async fn resume_payment<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Result<Json<CheckoutResponse>, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let reference = Reference::new(reference);
    authorized_order(&state, &headers, &reference).await?;
    let receipt = state.checkout.resume_payment(&reference).await?;
    Ok(Json(receipt.into()))
}

/// POST /orders/{reference}/cancel: cancel a pending order and release stock.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Result<Json<OrderDetails>, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let reference = Reference::new(reference);
    authorized_order(&state, &headers, &reference).await?;
    let details = state.checkout.cancel_order(&reference).await?;
    Ok(Json(details))
}

/// Loads an order and checks the caller may act on it.
async fn authorized_order<S, G>(
    state: &AppState<S, G>,
    headers: &HeaderMap,
    reference: &Reference,
) -> Result<OrderDetails, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let caller = state.auth.authenticate(headers)?;
    let details = state.checkout.get_order(reference).await?;
    caller.authorize_order(&details.order.owner)?;
    Ok(details)
}
