//! Products as seen by the inventory ledger.

use common::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Errors raised when registering or restocking a product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Product name is required")]
    NameRequired,

    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: Money },

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Stock for product {product_id} would overflow")]
    StockOverflow { product_id: ProductId },
}

/// A sellable product with its current unit price and stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

impl Product {
    /// Creates a new product with a fresh id after validating its fields.
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Result<Self, ProductError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProductError::NameRequired);
        }
        if !price.is_positive() {
            return Err(ProductError::InvalidPrice { price });
        }

        Ok(Self {
            id: ProductId::new(),
            name: name.trim().to_string(),
            price,
            stock,
        })
    }

    /// Returns true if `quantity` units can be reserved right now.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        quantity <= self.stock
    }

    /// Returns `quantity` units to stock.
    pub fn release(&mut self, quantity: u32) -> Result<(), ProductError> {
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or(ProductError::StockOverflow {
                product_id: self.id,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_validates_fields() {
        assert_eq!(
            Product::new("  ", Money::from_major(10), 1),
            Err(ProductError::NameRequired)
        );
        assert!(matches!(
            Product::new("Shea butter", Money::zero(), 1),
            Err(ProductError::InvalidPrice { .. })
        ));

        let product = Product::new(" Shea butter ", Money::from_major(10), 4).unwrap();
        assert_eq!(product.name, "Shea butter");
        assert_eq!(product.stock, 4);
    }

    #[test]
    fn test_stock_checks() {
        let product = Product::new("Comb", Money::from_major(5), 2).unwrap();
        assert!(product.has_stock_for(2));
        assert!(!product.has_stock_for(3));
    }

    #[test]
    fn test_release_overflow_is_rejected() {
        let mut product = Product::new("Comb", Money::from_major(5), u32::MAX).unwrap();
        assert!(matches!(
            product.release(1),
            Err(ProductError::StockOverflow { .. })
        ));

        product.stock = 1;
        product.release(2).unwrap();
        assert_eq!(product.stock, 3);
    }
}
