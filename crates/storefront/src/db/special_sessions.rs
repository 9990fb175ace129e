//! Special sessions and their enrollments.
//!
//! Enrolling locks the session row, checks for a duplicate, writes the
//! enrollment and bumps the counter in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use lupul_core::event::{RegistrationError, SessionEnrollment, SpecialSession};
use lupul_core::{Email, SpecialSessionId, UserId};

use super::{RegisterError, RepositoryError, to_i32, to_u32};

/// Storage for special sessions.
#[async_trait]
pub trait SpecialSessionStore: Send + Sync {
    /// All sessions, soonest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    async fn list(&self) -> Result<Vec<SpecialSession>, RepositoryError>;

    /// Create or replace a session, keeping its participant count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    async fn upsert(&self, session: &SpecialSession) -> Result<(), RepositoryError>;

    /// Enroll a participant and take one place.
    ///
    /// # Errors
    ///
    /// - `Rejected(NotFound)` for unknown sessions
    /// - `Rejected(AlreadyEnrolled)` if the user already has a place
    /// - `Rejected(SessionFull)` when no places are left
    async fn enroll(&self, enrollment: &SessionEnrollment)
    -> Result<SpecialSession, RegisterError>;

    /// Enrollments of one session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    async fn enrollments(
        &self,
        id: &SpecialSessionId,
    ) -> Result<Vec<SessionEnrollment>, RepositoryError>;
}

/// `PostgreSQL` special session store.
#[derive(Clone)]
pub struct PgSpecialSessionStore {
    pool: PgPool,
}

impl PgSpecialSessionStore {
    /// Create a new special session store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: SpecialSessionId,
    title: String,
    description: String,
    session_date: NaiveDate,
    location: String,
    max_participants: i32,
    current_participants: i32,
}

impl TryFrom<SessionRow> for SpecialSession {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            date: row.session_date,
            location: row.location,
            max_participants: to_u32(row.max_participants, "max_participants")?,
            current_participants: to_u32(row.current_participants, "current_participants")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    session_id: SpecialSessionId,
    user_id: UserId,
    name: String,
    email: String,
    phone: Option<String>,
    enrolled_at: DateTime<Utc>,
}

impl TryFrom<EnrollmentRow> for SessionEnrollment {
    type Error = RepositoryError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            session_id: row.session_id,
            user_id: row.user_id,
            name: row.name,
            email,
            phone: row.phone,
            enrolled_at: row.enrolled_at,
        })
    }
}

const SESSION_COLUMNS: &str =
    "id, title, description, session_date, location, max_participants, current_participants";

#[async_trait]
impl SpecialSessionStore for PgSpecialSessionStore {
    async fn list(&self) -> Result<Vec<SpecialSession>, RepositoryError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM storefront.special_sessions ORDER BY session_date"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SpecialSession::try_from).collect()
    }

    async fn upsert(&self, session: &SpecialSession) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.special_sessions
                (id, title, description, session_date, location, max_participants)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                session_date = EXCLUDED.session_date,
                location = EXCLUDED.location,
                max_participants = EXCLUDED.max_participants
            ",
        )
        .bind(&session.id)
        .bind(&session.title)
        .bind(&session.description)
        .bind(session.date)
        .bind(&session.location)
        .bind(to_i32(session.max_participants, "max_participants")?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn enroll(
        &self,
        enrollment: &SessionEnrollment,
    ) -> Result<SpecialSession, RegisterError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM storefront.special_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(&enrollment.session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            RegistrationError::NotFound(format!("special session {}", enrollment.session_id))
        })?;
        let mut session = SpecialSession::try_from(row)?;

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM storefront.session_enrollments WHERE session_id = $1 AND user_id = $2",
        )
        .bind(&enrollment.session_id)
        .bind(&enrollment.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(RegistrationError::AlreadyEnrolled.into());
        }

        session.admit()?;

        sqlx::query(
            r"
            INSERT INTO storefront.session_enrollments
                (session_id, user_id, name, email, phone, enrolled_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&enrollment.session_id)
        .bind(&enrollment.user_id)
        .bind(&enrollment.name)
        .bind(enrollment.email.as_str())
        .bind(&enrollment.phone)
        .bind(enrollment.enrolled_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE storefront.special_sessions SET current_participants = $2 WHERE id = $1",
        )
        .bind(&session.id)
        .bind(to_i32(session.current_participants, "current_participants")?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }

    async fn enrollments(
        &self,
        id: &SpecialSessionId,
    ) -> Result<Vec<SessionEnrollment>, RepositoryError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r"
            SELECT session_id, user_id, name, email, phone, enrolled_at
            FROM storefront.session_enrollments
            WHERE session_id = $1
            ORDER BY enrolled_at
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionEnrollment::try_from).collect()
    }
}
