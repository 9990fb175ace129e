//! Event storage and attendance.
//!
//! Registration is one conditional `UPDATE`: the user is appended only if
//! absent and the event still has room, so concurrent registrations cannot
//! push an event past its capacity.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use thiserror::Error;

use lupul_core::event::{Event, RegistrationChange, RegistrationError};
use lupul_core::{EventId, UserId};

use super::{RepositoryError, to_i32, to_u32};

/// Failure of a registration or enrollment.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The request breaks a registration rule.
    #[error(transparent)]
    Rejected(#[from] RegistrationError),

    /// Storage failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for RegisterError {
    fn from(error: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(error))
    }
}

/// Storage for events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Upcoming and past events, soonest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    async fn list(&self) -> Result<Vec<Event>, RepositoryError>;

    /// One event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    async fn get(&self, id: &EventId) -> Result<Option<Event>, RepositoryError>;

    /// Create or replace an event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    async fn upsert(&self, event: &Event) -> Result<(), RepositoryError>;

    /// Add `user` to the event's attendees.
    ///
    /// # Errors
    ///
    /// - `Rejected(NotFound)` for unknown events
    /// - `Rejected(CapacityExceeded)` when the event is full
    async fn register(
        &self,
        id: &EventId,
        user: &UserId,
    ) -> Result<(Event, RegistrationChange), RegisterError>;

    /// Remove `user` from the event's attendees.
    ///
    /// # Errors
    ///
    /// Returns `Rejected(NotFound)` for unknown events.
    async fn unregister(
        &self,
        id: &EventId,
        user: &UserId,
    ) -> Result<(Event, RegistrationChange), RegisterError>;
}

/// `PostgreSQL` event store.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create a new event store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: EventId,
    title: String,
    description: String,
    event_date: NaiveDate,
    event_time: String,
    location: String,
    capacity: i32,
    registered_users: Vec<String>,
}

impl TryFrom<EventRow> for Event {
    type Error = RepositoryError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            date: row.event_date,
            time: row.event_time,
            location: row.location,
            capacity: to_u32(row.capacity, "capacity")?,
            registered_users: row.registered_users.into_iter().map(UserId::new).collect(),
        })
    }
}

const REGISTER_ATTEMPTS: usize = 3;

const EVENT_COLUMNS: &str =
    "id, title, description, event_date, event_time, location, capacity, registered_users";

impl PgEventStore {
    fn not_found(id: &EventId) -> RegisterError {
        RegistrationError::NotFound(format!("event {id}")).into()
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn list(&self) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM storefront.events ORDER BY event_date, event_time"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }

    async fn get(&self, id: &EventId) -> Result<Option<Event>, RepositoryError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM storefront.events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Event::try_from).transpose()
    }

    async fn upsert(&self, event: &Event) -> Result<(), RepositoryError> {
        let users: Vec<&str> = event.registered_users.iter().map(UserId::as_str).collect();
        sqlx::query(
            r"
            INSERT INTO storefront.events
                (id, title, description, event_date, event_time, location, capacity, registered_users)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                event_date = EXCLUDED.event_date,
                event_time = EXCLUDED.event_time,
                location = EXCLUDED.location,
                capacity = EXCLUDED.capacity
            ",
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.time)
        .bind(&event.location)
        .bind(to_i32(event.capacity, "capacity")?)
        .bind(users)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn register(
        &self,
        id: &EventId,
        user: &UserId,
    ) -> Result<(Event, RegistrationChange), RegisterError> {
        for _ in 0..REGISTER_ATTEMPTS {
            let updated = sqlx::query_as::<_, EventRow>(&format!(
                r"
                UPDATE storefront.events
                SET registered_users = array_append(registered_users, $2)
                WHERE id = $1
                  AND NOT ($2 = ANY(registered_users))
                  AND cardinality(registered_users) < capacity
                RETURNING {EVENT_COLUMNS}
                "
            ))
            .bind(id)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = updated {
                return Ok((Event::try_from(row)?, RegistrationChange::Added));
            }

            // Nothing updated: unknown, already registered or full. A place
            // freed in between shows up as `Added` here, so try again.
            let mut event = self.get(id).await?.ok_or_else(|| Self::not_found(id))?;
            match event.register(user)? {
                RegistrationChange::Added => {}
                change => return Ok((event, change)),
            }
        }

        Err(RepositoryError::Conflict(format!("event {id} kept changing during registration")).into())
    }

    async fn unregister(
        &self,
        id: &EventId,
        user: &UserId,
    ) -> Result<(Event, RegistrationChange), RegisterError> {
        let before = self.get(id).await?.ok_or_else(|| Self::not_found(id))?;
        if !before.is_registered(user) {
            return Ok((before, RegistrationChange::Unchanged));
        }

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r"
            UPDATE storefront.events
            SET registered_users = array_remove(registered_users, $2)
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Self::not_found(id))?;

        Ok((Event::try_from(row)?, RegistrationChange::Removed))
    }
}
