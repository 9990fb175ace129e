//! Events, special sessions and the rules for joining them.
//!
//! Event attendance is a set of user ids bounded by the event's capacity.
//! Special sessions keep a participant counter plus one enrollment record per
//! participant. Stores apply these rules atomically; the methods here are the
//! single definition of what "register" and "enroll" mean.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::FieldErrors;
use crate::{Email, EventId, SpecialSessionId, UserId};

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Event has no free places.
    #[error("event is full ({capacity} places)")]
    CapacityExceeded {
        /// Event capacity.
        capacity: u32,
    },

    /// Special session has no free places.
    #[error("session is full ({max_participants} participants)")]
    SessionFull {
        /// Session limit.
        max_participants: u32,
    },

    /// The user is already enrolled in the session.
    #[error("already enrolled")]
    AlreadyEnrolled,

    /// No such event or session.
    #[error("{0} not found")]
    NotFound(String),
}

/// Effect of a register/unregister call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationChange {
    Added,
    Removed,
    Unchanged,
}

/// A community event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    /// Start time as shown to visitors ("18:30").
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    /// Maximum number of registered users.
    pub capacity: u32,
    #[serde(default)]
    pub registered_users: Vec<UserId>,
}

impl Event {
    /// Whether `user` is registered.
    #[must_use]
    pub fn is_registered(&self, user: &UserId) -> bool {
        self.registered_users.contains(user)
    }

    /// Number of registered users.
    #[must_use]
    pub fn participant_count(&self) -> u32 {
        u32::try_from(self.registered_users.len()).unwrap_or(u32::MAX)
    }

    /// Free places left.
    #[must_use]
    pub fn spots_left(&self) -> u32 {
        self.capacity.saturating_sub(self.participant_count())
    }

    /// Whether no places are left.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.participant_count() >= self.capacity
    }

    /// Add `user` to the attendees.
    ///
    /// Registering twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the event is full; attendees are unchanged.
    pub fn register(&mut self, user: &UserId) -> Result<RegistrationChange, RegistrationError> {
        if self.is_registered(user) {
            return Ok(RegistrationChange::Unchanged);
        }
        if self.is_full() {
            return Err(RegistrationError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.registered_users.push(user.clone());
        Ok(RegistrationChange::Added)
    }

    /// Remove `user` from the attendees. Absent users are a no-op.
    pub fn unregister(&mut self, user: &UserId) -> RegistrationChange {
        let before = self.registered_users.len();
        self.registered_users.retain(|u| u != user);
        if self.registered_users.len() == before {
            RegistrationChange::Unchanged
        } else {
            RegistrationChange::Removed
        }
    }
}

/// A special session with a participant counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialSession {
    pub id: SpecialSessionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub location: String,
    pub max_participants: u32,
    #[serde(default)]
    pub current_participants: u32,
}

impl SpecialSession {
    /// Take one place.
    ///
    /// # Errors
    ///
    /// Returns `SessionFull` when the counter has reached the limit.
    pub fn admit(&mut self) -> Result<(), RegistrationError> {
        if self.current_participants >= self.max_participants {
            return Err(RegistrationError::SessionFull {
                max_participants: self.max_participants,
            });
        }
        self.current_participants += 1;
        Ok(())
    }
}

/// One participant's enrollment in a special session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnrollment {
    pub session_id: SpecialSessionId,
    pub user_id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub enrolled_at: DateTime<Utc>,
}

/// Public sign-up form for an event (no account needed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSignupForm {
    pub event_id: String,
    pub event_title: String,
    pub event_date: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

/// A validated public sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSignup {
    pub event_id: EventId,
    pub event_title: String,
    pub event_date: Option<String>,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub message: Option<String>,
}

impl EventSignupForm {
    /// Check required fields and the email.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid field.
    pub fn validate(&self) -> Result<EventSignup, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("eventId", &self.event_id, "Evenimentul lipsește");
        errors.require("eventTitle", &self.event_title, "Titlul evenimentului lipsește");
        errors.require("name", &self.name, "Numele este obligatoriu");

        let email = if self.email.trim().is_empty() {
            errors.insert("email", "Adresa de email este obligatorie");
            None
        } else {
            let parsed = Email::parse(&self.email).ok();
            if parsed.is_none() {
                errors.insert("email", "Adresa de email nu este validă");
            }
            parsed
        };

        match email {
            Some(email) if errors.is_empty() => Ok(EventSignup {
                event_id: EventId::new(self.event_id.trim()),
                event_title: self.event_title.trim().to_owned(),
                event_date: optional(&self.event_date),
                name: self.name.trim().to_owned(),
                email,
                phone: optional(&self.phone),
                message: optional(&self.message),
            }),
            _ => Err(errors),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
