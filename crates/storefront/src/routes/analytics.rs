//! Analytics proxy.
//!
//! The browser posts events here instead of to a third party; they are
//! stored as is for later export.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::models::AnalyticsPayload;
use crate::state::AppState;

/// Record one analytics event.
#[instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn record(
    State(state): State<AppState>,
    Json(payload): Json<AnalyticsPayload>,
) -> Result<StatusCode> {
    let event = payload
        .into_event(Utc::now())
        .map_err(|reason| AppError::BadRequest(reason.to_string()))?;

    state.stores().analytics.record(&event).await?;
    Ok(StatusCode::ACCEPTED)
}
