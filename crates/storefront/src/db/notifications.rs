//! Ledger of order confirmation emails.
//!
//! Each order number can be claimed once. The claim is taken before the email
//! is sent and released if sending fails, so reloading the confirmation page
//! never mails the same order twice.

use async_trait::async_trait;
use sqlx::PgPool;

use lupul_core::OrderNumber;

use super::RepositoryError;

/// At-most-once marker per order.
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Claim `order_number` for a send to `recipient`.
    ///
    /// Returns `false` if the order was already claimed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the ledger cannot be written.
    async fn claim(
        &self,
        order_number: &OrderNumber,
        recipient: &str,
    ) -> Result<bool, RepositoryError>;

    /// Give a claim back after a failed send.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the ledger cannot be written.
    async fn release(&self, order_number: &OrderNumber) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` notification ledger.
#[derive(Clone)]
pub struct PgNotificationLedger {
    pool: PgPool,
}

impl PgNotificationLedger {
    /// Create a new ledger.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationLedger for PgNotificationLedger {
    async fn claim(
        &self,
        order_number: &OrderNumber,
        recipient: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO storefront.order_notifications (order_number, recipient)
            VALUES ($1, $2)
            ON CONFLICT (order_number) DO NOTHING
            ",
        )
        .bind(order_number)
        .bind(recipient)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, order_number: &OrderNumber) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.order_notifications WHERE order_number = $1")
            .bind(order_number)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
