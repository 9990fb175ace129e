//! Event and special session management.
//!
//! Both commands upsert: running them again updates the details without
//! touching existing registrations.

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use lupul_core::event::{Event, SpecialSession};
use lupul_storefront::db::{
    self, EventStore, PgEventStore, PgSpecialSessionStore, RepositoryError, SpecialSessionStore,
};

/// Errors that can occur while managing events.
#[derive(Debug, Error)]
pub enum EventCommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Write failed.
    #[error("Could not save: {0}")]
    Repository(#[from] RepositoryError),

    /// Rejected input.
    #[error("Invalid input: {0}")]
    Invalid(String),
}

async fn connect() -> Result<PgPool, EventCommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| EventCommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}

fn require_text(value: &str, field: &str) -> Result<(), EventCommandError> {
    if value.trim().is_empty() {
        return Err(EventCommandError::Invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Create or update an event.
///
/// # Errors
///
/// Returns `EventCommandError` if the input is invalid or the write fails.
pub async fn create_event(event: &Event) -> Result<(), EventCommandError> {
    require_text(event.id.as_str(), "id")?;
    require_text(&event.title, "title")?;

    let pool = connect().await?;
    PgEventStore::new(pool).upsert(event).await?;

    tracing::info!(id = %event.id, capacity = event.capacity, "Event saved");
    Ok(())
}

/// Create or update a special session.
///
/// # Errors
///
/// Returns `EventCommandError` if the input is invalid or the write fails.
pub async fn create_session(session: &SpecialSession) -> Result<(), EventCommandError> {
    require_text(session.id.as_str(), "id")?;
    require_text(&session.title, "title")?;

    let pool = connect().await?;
    PgSpecialSessionStore::new(pool).upsert(session).await?;

    tracing::info!(
        id = %session.id,
        max_participants = session.max_participants,
        "Special session saved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_rejects_blank() {
        assert!(require_text("  ", "title").is_err());
        assert!(require_text("Lansare", "title").is_ok());
    }
}
