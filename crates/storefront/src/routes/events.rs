//! Event, special session and sign-up handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use lupul_core::event::{
    Event, EventSignupForm, RegistrationChange, SessionEnrollment, SpecialSession,
};
use lupul_core::validation::FieldErrors;
use lupul_core::{Email, EventId, SpecialSessionId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::services::event_signup::submit_signup;
use crate::state::AppState;

/// Public view of an event. Attendee ids are not exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    pub capacity: u32,
    pub participant_count: u32,
    pub spots_left: u32,
    pub is_full: bool,
    /// Whether the signed-in user is registered; `false` for visitors.
    pub is_registered: bool,
}

impl EventView {
    fn new(event: &Event, user: Option<&CurrentUser>) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            date: event.date,
            time: event.time.clone(),
            location: event.location.clone(),
            capacity: event.capacity,
            participant_count: event.participant_count(),
            spots_left: event.spots_left(),
            is_full: event.is_full(),
            is_registered: user.is_some_and(|u| event.is_registered(&u.id)),
        }
    }
}

/// Answer of the registration endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub event: EventView,
    pub change: RegistrationChange,
}

/// All events.
#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Vec<EventView>>> {
    let events = state.stores().events.list().await?;
    Ok(Json(
        events
            .iter()
            .map(|event| EventView::new(event, user.as_ref()))
            .collect(),
    ))
}

/// One event.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<EventId>,
) -> Result<Json<EventView>> {
    let event = state
        .stores()
        .events
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("evenimentul {id}")))?;
    Ok(Json(EventView::new(&event, user.as_ref())))
}

/// Register the signed-in user for an event.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn register(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<EventId>,
) -> Result<Json<RegistrationResponse>> {
    let (event, change) = state.stores().events.register(&id, &user.id).await?;

    if change == RegistrationChange::Added {
        tracing::info!(event_id = %id, spots_left = event.spots_left(), "User registered for event");
        add_breadcrumb("events", "Registered for event", Some(&[("event_id", id.as_str())]));
    }
    Ok(Json(RegistrationResponse {
        event: EventView::new(&event, Some(&user)),
        change,
    }))
}

/// Remove the signed-in user from an event.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn unregister(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<EventId>,
) -> Result<Json<RegistrationResponse>> {
    let (event, change) = state.stores().events.unregister(&id, &user.id).await?;

    if change == RegistrationChange::Removed {
        tracing::info!(event_id = %id, "User unregistered from event");
    }
    Ok(Json(RegistrationResponse {
        event: EventView::new(&event, Some(&user)),
        change,
    }))
}

/// All special sessions.
#[instrument(skip(state))]
pub async fn list_special_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SpecialSession>>> {
    Ok(Json(state.stores().special_sessions.list().await?))
}

/// Body of `POST /api/special-sessions/{id}/enrollments`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrollmentRequest {
    pub name: String,
    /// Contact address; defaults to the account email.
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl EnrollmentRequest {
    fn into_enrollment(
        self,
        session_id: SpecialSessionId,
        user: &CurrentUser,
    ) -> std::result::Result<SessionEnrollment, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name, "Numele este obligatoriu");

        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => Some(user.email.clone()),
            Some(raw) => Email::parse(raw).ok(),
        };
        if email.is_none() {
            errors.insert("email", "Adresa de email nu este validă");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(SessionEnrollment {
                session_id,
                user_id: user.id.clone(),
                name: self.name.trim().to_owned(),
                email,
                phone: self
                    .phone
                    .map(|p| p.trim().to_owned())
                    .filter(|p| !p.is_empty()),
                enrolled_at: Utc::now(),
            }),
            _ => Err(errors),
        }
    }
}

/// Enroll the signed-in user in a special session.
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn enroll(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SpecialSessionId>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<(StatusCode, Json<SpecialSession>)> {
    let enrollment = request
        .into_enrollment(id, &user)
        .map_err(AppError::Validation)?;

    let session = state
        .stores()
        .special_sessions
        .enroll(&enrollment)
        .await?;

    tracing::info!(
        session_id = %session.id,
        current_participants = session.current_participants,
        "User enrolled in special session"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

/// Answer of the public sign-up form.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub id: Uuid,
    pub message: &'static str,
}

/// Public event sign-up form (no account needed).
#[instrument(skip(state, form))]
pub async fn signup(
    State(state): State<AppState>,
    Json(form): Json<EventSignupForm>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    let signup = form.validate().map_err(AppError::Validation)?;

    let registration = submit_signup(
        signup,
        state.stores().event_registrations.as_ref(),
        state.mailer(),
        &state.config().admin_email,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: registration.id,
            message: "Înscrierea a fost înregistrată. Vei primi un email de confirmare.",
        }),
    ))
}
