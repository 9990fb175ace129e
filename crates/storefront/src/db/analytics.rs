//! Analytics event sink.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::models::AnalyticsEvent;

use super::RepositoryError;

/// Append-only storage for analytics events.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Append one event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    async fn record(&self, event: &AnalyticsEvent) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` analytics store.
#[derive(Clone)]
pub struct PgAnalyticsStore {
    pool: PgPool,
}

impl PgAnalyticsStore {
    /// Create a new analytics store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    async fn record(&self, event: &AnalyticsEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.analytics_events (name, path, properties, received_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&event.name)
        .bind(&event.path)
        .bind(Json(&event.properties))
        .bind(event.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
