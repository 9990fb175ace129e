//! Session sign-in and sign-out.
//!
//! The visitor signs in with the identity provider in the browser and posts
//! the resulting ID token here. The verified account is stored in the
//! session; the session id is rotated on every change of identity.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Body of `POST /auth/session`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub id_token: String,
}

/// Who is signed in.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<CurrentUser>,
}

/// Exchange an identity provider ID token for a session.
#[instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SessionResponse>> {
    let token = request.id_token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("Tokenul de autentificare lipsește.".to_string()));
    }

    let user = state.identity().verify(token).await?;

    session.cycle_id().await?;
    set_current_user(&session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    tracing::info!(user_id = %user.id, "User signed in");
    Ok(Json(SessionResponse { user: Some(user) }))
}

/// Sign out.
#[instrument(skip_all)]
pub async fn sign_out(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    session.cycle_id().await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Current sign-in state.
pub async fn current(OptionalAuth(user): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse { user })
}
