use std::collections::HashMap;

use async_trait::async_trait;
use common::{OrderId, OrderItemId, PaymentId, ProductId, Reference, UserId};
use domain::{
    Email, Money, OrderError, OrderStatus, Owner, PaymentOutcome, PaymentStatus, Product,
    ProductError, ShippingAddress, Transition, price_cart,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    OrderDetails, OrderDraft, OrderItemRecord, OrderRecord, PaymentRecord, Result, Settlement,
    Store, StoreError,
};

const PRODUCT_COLUMNS: &str = "id, name, price, stock";
const ORDER_COLUMNS: &str = "id, user_id, guest_email, contact_email, total_amount, status, \
                             shipping_address, reference, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price";
const PAYMENT_COLUMNS: &str = "id, order_id, amount, status, reference, payment_method, \
                               authorization_url, created_at, updated_at";

/// PostgreSQL-backed store implementation.
///
/// Stock reservation locks the affected product rows (`FOR UPDATE`, in id
/// order) for the whole placement transaction. Payment settlement and order
/// cancellation lock the payment row first and then the order row, so the
/// two never wait on each other in opposite order.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Starts a read-only transaction that sees one consistent snapshot.
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::new(row.try_get::<Decimal, _>("price")?),
            stock: from_db_count(row.try_get("stock")?)?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
        let user_id = row
            .try_get::<Option<Uuid>, _>("user_id")?
            .map(UserId::from_uuid);
        let guest_email = row
            .try_get::<Option<String>, _>("guest_email")?
            .map(|email| parse_email(&email))
            .transpose()?;
        let owner = Owner::from_parts(user_id, guest_email)
            .ok_or_else(|| StoreError::Corrupt("order must have exactly one owner".to_string()))?;
        let shipping_address: Json<ShippingAddress> = row.try_get("shipping_address")?;

        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get("id")?),
            owner,
            contact_email: parse_email(&row.try_get::<String, _>("contact_email")?)?,
            total_amount: Money::new(row.try_get::<Decimal, _>("total_amount")?),
            status: row.try_get::<String, _>("status")?.parse()?,
            shipping_address: shipping_address.0,
            reference: Reference::new(row.try_get::<String, _>("reference")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            id: OrderItemId::from_uuid(row.try_get("id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            quantity: from_db_count(row.try_get("quantity")?)?,
            price: Money::new(row.try_get::<Decimal, _>("price")?),
        })
    }

    fn row_to_payment(row: &PgRow) -> Result<PaymentRecord> {
        Ok(PaymentRecord {
            id: PaymentId::from_uuid(row.try_get("id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            amount: Money::new(row.try_get::<Decimal, _>("amount")?),
            status: row.try_get::<String, _>("status")?.parse()?,
            reference: Reference::new(row.try_get::<String, _>("reference")?),
            payment_method: row.try_get::<String, _>("payment_method")?.parse()?,
            authorization_url: row.try_get("authorization_url")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<OrderRecord> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(id.to_string()))?;
        Self::row_to_order(&row)
    }

    async fn load_details(conn: &mut PgConnection, order: OrderRecord) -> Result<OrderDetails> {
        let items = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position"
        ))
        .bind(order.id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(Self::row_to_item)
        .collect::<Result<Vec<_>>>()?;

        let payment_row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order.id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::Corrupt(format!("order {} has no payment", order.id)))?;

        Ok(OrderDetails {
            payment: Self::row_to_payment(&payment_row)?,
            order,
            items,
        })
    }

    async fn lock_products(
        conn: &mut PgConnection,
        ids: impl Iterator<Item = ProductId>,
    ) -> Result<HashMap<ProductId, Product>> {
        let mut ids: Vec<Uuid> = ids.map(|id| id.as_uuid()).collect();
        ids.sort();
        ids.dedup();

        sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids[..])
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|row| Self::row_to_product(row).map(|product| (product.id, product)))
        .collect()
    }
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn from_db_count(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative count {value}")))
}

fn to_db_count(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("count {value} out of range")))
}

fn is_violation_of(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        let stock = i32::try_from(product.stock).map_err(|_| ProductError::StockOverflow {
            product_id: product.id,
        })?;

        let row = sqlx::query(&format!(
            "INSERT INTO products (id, name, price, stock) VALUES ($1, $2, $3, $4) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(stock)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_violation_of(&e, "products_pkey") {
                return StoreError::DuplicateProduct(product.id);
            }
            StoreError::Database(e)
        })?;

        Self::row_to_product(&row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(Self::row_to_product)
            .transpose()
    }

    async fn restock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity }.into());
        }

        let mut tx = self.pool.begin().await?;
        let mut product = Self::lock_products(&mut tx, std::iter::once(id))
            .await?
            .remove(&id)
            .ok_or(OrderError::ProductNotFound(id))?;
        product.release(quantity)?;
        let stock = i32::try_from(product.stock)
            .map_err(|_| ProductError::StockOverflow { product_id: id })?;

        sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(stock)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(product)
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity }.into());
        }

        let reserved = sqlx::query(&format!(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND stock >= $2 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(to_db_count(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        match reserved {
            Some(row) => Self::row_to_product(&row),
            None => {
                let product = self
                    .get_product(id)
                    .await?
                    .ok_or(OrderError::ProductNotFound(id))?;
                Err(OrderError::InsufficientStock {
                    product_id: id,
                    requested: quantity,
                    available: product.stock,
                }
                .into())
            }
        }
    }

    #[tracing::instrument(skip(self, draft), fields(reference = %draft.reference))]
    async fn place_order(&self, draft: OrderDraft) -> Result<OrderDetails> {
        let mut tx = self.pool.begin().await?;

        let products =
            Self::lock_products(&mut tx, draft.lines.iter().map(|line| line.product_id)).await?;
        let priced = price_cart(&draft.lines, &products)?;

        let order_row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, user_id, guest_email, contact_email, total_amount, status, shipping_address, reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(draft.order_id.as_uuid())
        .bind(draft.owner.user_id().map(|id| id.as_uuid()))
        .bind(draft.owner.guest_email().map(Email::as_str))
        .bind(draft.contact_email.as_str())
        .bind(priced.total.amount())
        .bind(OrderStatus::Pending.as_str())
        .bind(Json(&draft.shipping_address))
        .bind(draft.reference.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_violation_of(&e, "unique_order_reference") {
                return StoreError::DuplicateReference(draft.reference.clone());
            }
            StoreError::Database(e)
        })?;
        let order = Self::row_to_order(&order_row)?;

        let mut items = Vec::with_capacity(priced.lines.len());
        for (position, line) in priced.lines.iter().enumerate() {
            let quantity = to_db_count(line.quantity)?;

            let item_row = sqlx::query(&format!(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(OrderItemId::new().as_uuid())
            .bind(order.id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(quantity)
            .bind(line.unit_price.amount())
            .bind(to_db_count(u32::try_from(position).unwrap_or(u32::MAX))?)
            .fetch_one(&mut *tx)
            .await?;
            items.push(Self::row_to_item(&item_row)?);

            let updated = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id.as_uuid())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available: products
                        .get(&line.product_id)
                        .map(|p| p.stock)
                        .unwrap_or_default(),
                }
                .into());
            }
        }

        let payment_row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (id, order_id, amount, status, reference, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(PaymentId::new().as_uuid())
        .bind(order.id.as_uuid())
        .bind(priced.total.amount())
        .bind(PaymentStatus::Pending.as_str())
        .bind(draft.reference.as_str())
        .bind(draft.payment_method.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let payment = Self::row_to_payment(&payment_row)?;

        tx.commit().await?;
        tracing::debug!(order_id = %order.id, "order committed");

        Ok(OrderDetails {
            order,
            items,
            payment,
        })
    }

    async fn record_checkout_session(
        &self,
        reference: &Reference,
        authorization_url: &str,
    ) -> Result<PaymentRecord> {
        let row = sqlx::query(&format!(
            "UPDATE payments SET authorization_url = $2, updated_at = NOW() \
             WHERE reference = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(reference.as_str())
        .bind(authorization_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::PaymentNotFound(reference.clone()))?;

        Self::row_to_payment(&row)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        let mut tx = self.begin_snapshot().await?;
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

        let details = match row {
            Some(row) => Some(Self::load_details(&mut tx, Self::row_to_order(&row)?).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(details)
    }

    async fn get_order_by_reference(&self, reference: &Reference) -> Result<Option<OrderDetails>> {
        let mut tx = self.begin_snapshot().await?;
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE reference = $1"
        ))
        .bind(reference.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let details = match row {
            Some(row) => Some(Self::load_details(&mut tx, Self::row_to_order(&row)?).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(details)
    }

    async fn get_payment_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<PaymentRecord>> {
        sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"
        ))
        .bind(reference.as_str())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(Self::row_to_payment)
        .transpose()
    }

    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    async fn settle_payment(
        &self,
        reference: &Reference,
        outcome: PaymentOutcome,
    ) -> Result<Settlement> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::PaymentNotFound(reference.clone()))?;
        let payment = Self::row_to_payment(&row)?;

        let to = match payment.status.apply(outcome) {
            Transition::Applied { to, .. } => to,
            Transition::AlreadySettled(_) => {
                let order = Self::fetch_order(&mut tx, payment.order_id).await?;
                tx.commit().await?;
                return Ok(Settlement::AlreadySettled { payment, order });
            }
        };

        // Guarded on the stored status; the row lock above makes this
        // always match, but a missing match must never overwrite.
        let updated = sqlx::query(&format!(
            "UPDATE payments SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id.as_uuid())
        .bind(to.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(updated) = updated else {
            let order = Self::fetch_order(&mut tx, payment.order_id).await?;
            tx.commit().await?;
            return Ok(Settlement::AlreadySettled { payment, order });
        };
        let payment = Self::row_to_payment(&updated)?;

        if to == PaymentStatus::Success {
            sqlx::query(
                "UPDATE orders SET status = 'paid', updated_at = NOW() \
                 WHERE id = $1 AND status = 'pending'",
            )
            .bind(payment.order_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }
        let order = Self::fetch_order(&mut tx, payment.order_id).await?;

        tx.commit().await?;
        Ok(Settlement::Applied { payment, order })
    }

    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    async fn cancel_order(&self, reference: &Reference) -> Result<OrderDetails> {
        let mut tx = self.pool.begin().await?;

        let payment_row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::OrderNotFound(reference.to_string()))?;
        let payment = Self::row_to_payment(&payment_row)?;

        let order_row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(payment.order_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        let order = Self::row_to_order(&order_row)?;

        if !order.status.can_cancel() || payment.status == PaymentStatus::Success {
            return Err(StoreError::InvalidTransition {
                reference: reference.clone(),
                status: order.status,
                action: "cancel",
            });
        }

        let details = Self::load_details(&mut tx, order).await?;
        let mut products =
            Self::lock_products(&mut tx, details.items.iter().map(|item| item.product_id)).await?;
        for item in &details.items {
            let product = products.get_mut(&item.product_id).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "order item references missing product {}",
                    item.product_id
                ))
            })?;
            product.release(item.quantity)?;
        }
        for product in products.values() {
            let stock = i32::try_from(product.stock).map_err(|_| ProductError::StockOverflow {
                product_id: product.id,
            })?;
            sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
                .bind(product.id.as_uuid())
                .bind(stock)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "UPDATE payments SET status = 'failed', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment.id.as_uuid())
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE orders SET status = 'cancelled', updated_at = NOW() WHERE id = $1")
            .bind(payment.order_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let order = Self::fetch_order(&mut tx, payment.order_id).await?;
        let details = Self::load_details(&mut tx, order).await?;
        tx.commit().await?;

        Ok(details)
    }
}
