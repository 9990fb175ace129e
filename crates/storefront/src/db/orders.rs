//! Authoritative order records.
//!
//! An order is written once, at checkout, and read back by the confirmation
//! page when none of the visitor's own backups survived.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use lupul_core::order::{Order, OrderItem};
use lupul_core::{OrderNumber, OrderStatus, PaymentMethod};

use super::RepositoryError;

/// Storage for placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    async fn insert(&self, order: &Order, status: OrderStatus) -> Result<(), RepositoryError>;

    /// Look an order up by number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the row is unreadable.
    async fn find(&self, order_number: &OrderNumber) -> Result<Option<Order>, RepositoryError>;

    /// Verify the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` order store.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_number: OrderNumber,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    customer_address: String,
    customer_city: String,
    customer_county: String,
    postal_code: Option<String>,
    notes: Option<String>,
    total_amount: Decimal,
    shipping_cost: Decimal,
    items: Json<Vec<OrderItem>>,
    payment_method: String,
    placed_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            order_number: row.order_number,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            customer_address: row.customer_address,
            customer_city: row.customer_city,
            customer_county: row.customer_county,
            postal_code: row.postal_code,
            notes: row.notes,
            total_amount: row.total_amount,
            shipping_cost: row.shipping_cost,
            items: row.items.0,
            payment_method: PaymentMethod::from_db(&row.payment_method),
            date: Some(row.placed_at),
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order, status: OrderStatus) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.orders (
                order_number, customer_name, customer_email, customer_phone,
                customer_address, customer_city, customer_county, postal_code, notes,
                total_amount, shipping_cost, items, payment_method, status, placed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(&order.order_number)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.customer_address)
        .bind(&order.customer_city)
        .bind(&order.customer_county)
        .bind(&order.postal_code)
        .bind(&order.notes)
        .bind(order.total_amount)
        .bind(order.shipping_cost)
        .bind(Json(&order.items))
        .bind(order.payment_method.as_str())
        .bind(status.as_str())
        .bind(order.date.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "order"))?;

        Ok(())
    }

    async fn find(&self, order_number: &OrderNumber) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT order_number, customer_name, customer_email, customer_phone,
                   customer_address, customer_city, customer_county, postal_code, notes,
                   total_amount, shipping_cost, items, payment_method, placed_at
            FROM storefront.orders
            WHERE order_number = $1
            ",
        )
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
