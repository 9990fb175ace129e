//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `lupul_storefront`
//!
//! ## Tables (schema `storefront`)
//!
//! - `orders` - Authoritative order records written at checkout
//! - `order_notifications` - One row per order whose confirmation email was claimed
//! - `events` - Community events with their registered users
//! - `special_sessions` - Workshops with a participant counter
//! - `session_enrollments` - One row per special session participant
//! - `event_registrations` - Public event sign-up form submissions
//! - `analytics_events` - Client analytics forwarded by the proxy
//!
//! Sessions live in `tower_sessions.session`, created by the session store.
//!
//! Every table is reached through a store trait so handlers can run against
//! the in-memory stores in [`memory`] during tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p lupul-cli -- migrate
//! ```

pub mod analytics;
pub mod event_registrations;
pub mod events;
pub mod memory;
pub mod notifications;
pub mod orders;
pub mod special_sessions;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use analytics::{AnalyticsStore, PgAnalyticsStore};
pub use event_registrations::{EventRegistrationStore, PgEventRegistrationStore};
pub use events::{EventStore, PgEventStore, RegisterError};
pub use notifications::{NotificationLedger, PgNotificationLedger};
pub use orders::{OrderStore, PgOrderStore};
pub use special_sessions::{PgSpecialSessionStore, SpecialSessionStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(error: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = error
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(error)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Every store the handlers use.
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub notifications: Arc<dyn NotificationLedger>,
    pub events: Arc<dyn EventStore>,
    pub special_sessions: Arc<dyn SpecialSessionStore>,
    pub event_registrations: Arc<dyn EventRegistrationStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
}

impl Stores {
    /// Stores backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            notifications: Arc::new(PgNotificationLedger::new(pool.clone())),
            events: Arc::new(PgEventStore::new(pool.clone())),
            special_sessions: Arc::new(PgSpecialSessionStore::new(pool.clone())),
            event_registrations: Arc::new(PgEventRegistrationStore::new(pool.clone())),
            analytics: Arc::new(PgAnalyticsStore::new(pool.clone())),
        }
    }

    /// Empty in-memory stores.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            orders: Arc::new(memory::MemoryOrderStore::default()),
            notifications: Arc::new(memory::MemoryNotificationLedger::default()),
            events: Arc::new(memory::MemoryEventStore::default()),
            special_sessions: Arc::new(memory::MemorySpecialSessionStore::default()),
            event_registrations: Arc::new(memory::MemoryEventRegistrationStore::default()),
            analytics: Arc::new(memory::MemoryAnalyticsStore::default()),
        }
    }
}

/// Convert a stored non-negative integer column.
pub(crate) fn to_u32(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a count for an integer column.
pub(crate) fn to_i32(value: u32, column: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{column} out of range: {value}")))
}
