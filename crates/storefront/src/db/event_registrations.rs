//! Public event sign-up submissions.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::EventRegistration;

use super::RepositoryError;

/// Storage for sign-up form submissions.
#[async_trait]
pub trait EventRegistrationStore: Send + Sync {
    /// Persist a submission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    async fn insert(&self, registration: &EventRegistration) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` sign-up store.
#[derive(Clone)]
pub struct PgEventRegistrationStore {
    pool: PgPool,
}

impl PgEventRegistrationStore {
    /// Create a new sign-up store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRegistrationStore for PgEventRegistrationStore {
    async fn insert(&self, registration: &EventRegistration) -> Result<(), RepositoryError> {
        let signup = &registration.signup;
        sqlx::query(
            r"
            INSERT INTO storefront.event_registrations
                (id, event_id, event_title, event_date, name, email, phone, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(registration.id)
        .bind(&signup.event_id)
        .bind(&signup.event_title)
        .bind(&signup.event_date)
        .bind(&signup.name)
        .bind(signup.email.as_str())
        .bind(&signup.phone)
        .bind(&signup.message)
        .bind(registration.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "registration"))?;
        Ok(())
    }
}
