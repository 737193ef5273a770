//! Inventory ledger: the only way stock changes outside of order placement.

use common::ProductId;
use domain::{Money, OrderError, Product};
use store::Store;

use crate::error::Result;

/// Registers products and moves their stock.
#[derive(Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S: Store> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a new product with its initial stock.
    #[tracing::instrument(skip(self, price))]
    pub async fn register(&self, name: &str, price: Money, stock: u32) -> Result<Product> {
        let product = Product::new(name, price, stock)?;
        let product = self.store.insert_product(product).await?;
        tracing::info!(product_id = %product.id, stock, "product registered");
        Ok(product)
    }

    /// Returns the product with its current stock level.
    pub async fn stock_level(&self, id: ProductId) -> Result<Product> {
        let product = self
            .store
            .get_product(id)
            .await?
            .ok_or(OrderError::ProductNotFound(id))?;
        Ok(product)
    }

    /// Adds units to a product's stock.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        let product = self.store.restock(id, quantity).await?;
        tracing::info!(stock = product.stock, "product restocked");
        Ok(product)
    }

    /// Checks and decrements stock in one step.
    ///
    /// Fails with `InsufficientStock` without changing anything if fewer than
    /// `quantity` units are left.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, id: ProductId, quantity: u32) -> Result<Product> {
        let product = self.store.reserve_stock(id, quantity).await?;
        tracing::debug!(stock = product.stock, "stock reserved");
        Ok(product)
    }
}
