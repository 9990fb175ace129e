//! Public event sign-ups.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use lupul_core::event::EventSignup;

/// A stored submission of the public event sign-up form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistration {
    pub id: Uuid,
    #[serde(flatten)]
    pub signup: EventSignup,
    pub created_at: DateTime<Utc>,
}

impl EventRegistration {
    /// Record a sign-up received now.
    #[must_use]
    pub fn new(signup: EventSignup) -> Self {
        Self {
            id: Uuid::new_v4(),
            signup,
            created_at: Utc::now(),
        }
    }
}
