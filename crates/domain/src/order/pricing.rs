//! Cart pricing against current product records.

use std::collections::HashMap;

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::product::Product;

use super::{CartLine, OrderError};

/// A cart line with the unit price captured at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl PricedLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The result of pricing a whole cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// Prices every line and checks it against available stock.
///
/// Fails on the first line whose product is unknown or under-stocked; nothing
/// is reserved here. Lines for the same product are checked against stock
/// by their running sum. The caller must hold whatever lock makes `products`
/// current for the reservation that follows.
pub fn price_cart(
    lines: &[CartLine],
    products: &HashMap<ProductId, Product>,
) -> Result<PricedCart, OrderError> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut requested: HashMap<ProductId, u32> = HashMap::new();

    for line in lines {
        let product = products
            .get(&line.product_id)
            .ok_or(OrderError::ProductNotFound(line.product_id))?;

        let total = requested.entry(line.product_id).or_default();
        *total = total.saturating_add(line.quantity);
        if !product.has_stock_for(*total) {
            return Err(OrderError::InsufficientStock {
                product_id: line.product_id,
                requested: *total,
                available: product.stock,
            });
        }

        priced.push(PricedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    let total = priced.iter().map(PricedLine::line_total).sum();
    Ok(PricedCart {
        lines: priced,
        total,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn catalog(products: &[&Product]) -> HashMap<ProductId, Product> {
        products.iter().map(|p| (p.id, (*p).clone())).collect()
    }

    #[test]
    fn test_total_is_sum_of_lines() {
        let soap = Product::new("Soap", Money::new(dec!(1000.00)), 10).unwrap();
        let comb = Product::new("Comb", Money::new(dec!(250.50)), 10).unwrap();
        let products = catalog(&[&soap, &comb]);

        let cart = price_cart(
            &[CartLine::new(soap.id, 2), CartLine::new(comb.id, 1)],
            &products,
        )
        .unwrap();

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].unit_price, soap.price);
        assert_eq!(cart.total.amount(), dec!(2250.50));
    }

    #[test]
    fn test_unknown_product_is_rejected() {
        let missing = ProductId::new();
        let result = price_cart(&[CartLine::new(missing, 1)], &HashMap::new());
        assert_eq!(result, Err(OrderError::ProductNotFound(missing)));
    }

    #[test]
    fn test_insufficient_stock_reports_availability() {
        let soap = Product::new("Soap", Money::from_major(1000), 1).unwrap();
        let products = catalog(&[&soap]);

        let result = price_cart(&[CartLine::new(soap.id, 2)], &products);
        assert_eq!(
            result,
            Err(OrderError::InsufficientStock {
                product_id: soap.id,
                requested: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_repeated_product_lines_share_stock() {
        let soap = Product::new("Soap", Money::from_major(1000), 5).unwrap();
        let products = catalog(&[&soap]);

        let result = price_cart(
            &[CartLine::new(soap.id, 3), CartLine::new(soap.id, 3)],
            &products,
        );
        assert_eq!(
            result,
            Err(OrderError::InsufficientStock {
                product_id: soap.id,
                requested: 6,
                available: 5
            })
        );

        let cart = price_cart(
            &[CartLine::new(soap.id, 2), CartLine::new(soap.id, 3)],
            &products,
        )
        .unwrap();
        assert_eq!(cart.total, Money::from_major(5000));
    }
}
