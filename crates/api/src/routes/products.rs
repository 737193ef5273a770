//! Inventory administration.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use checkout::PaymentGateway;
use common::ProductId;
use domain::{Money, Product};
use rust_decimal::Decimal;
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

/// POST /products: register a product (admin).
#[tracing::instrument(skip_all)]
pub async fn create<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    state.auth.authenticate(&headers)?.require_admin()?;
    let Json(req) = payload?;
    let product = state
        .checkout
        .register_product(&req.name, Money::new(req.price), req.stock)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// POST /products/{id}/restock: add units to stock (admin).
#[tracing::instrument(skip(state, headers, payload))]
pub async fn restock<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<Product>, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    state.auth.authenticate(&headers)?.require_admin()?;
    let Json(req) = payload?;
    let product = state.checkout.restock(id, req.quantity).await?;
    Ok(Json(product))
}

/// GET /products/{id}: product with its current stock level.
pub async fn get<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError>
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let product = state.checkout.get_product(id).await?;
    Ok(Json(product))
}
