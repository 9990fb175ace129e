//! Checkout route handlers.
//!
//! The controller is rebuilt on every request from the signed-in user and
//! the session's guest checkout choice, then driven through the submission.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use lupul_core::OrderNumber;
use lupul_core::checkout::{AuthState, CheckoutController, CheckoutForm, CheckoutPhase};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::{CurrentUser, session_keys};
use crate::services::{Visitor, place_order};
use crate::state::AppState;

/// Checkout state shown before the form is submitted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub phase: CheckoutPhase,
    pub form: CheckoutForm,
    pub guest_checkout_available: bool,
}

/// Result of a successful submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub phase: CheckoutPhase,
    pub order_number: OrderNumber,
    pub redirect_url: String,
}

async fn controller(
    state: &AppState,
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<CheckoutController> {
    let auth = user.map_or(AuthState::Anonymous, CurrentUser::auth_state);
    let mut controller = CheckoutController::new(&auth, false);

    let guest = session
        .get::<bool>(session_keys::GUEST_CHECKOUT)
        .await?
        .unwrap_or(false);
    if guest && state.config().guest_checkout {
        controller.continue_as_guest();
    }
    Ok(controller)
}

fn view(state: &AppState, controller: &CheckoutController) -> CheckoutView {
    CheckoutView {
        phase: controller.phase(),
        form: controller.form().clone(),
        guest_checkout_available: state.config().guest_checkout,
    }
}

/// Current checkout phase and prefilled form.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CheckoutView>> {
    let controller = controller(&state, &session, user.as_ref()).await?;
    Ok(Json(view(&state, &controller)))
}

/// Opt an anonymous visitor into guest checkout.
#[instrument(skip(state, session, user))]
pub async fn continue_as_guest(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CheckoutView>> {
    if !state.config().guest_checkout {
        return Err(AppError::BadRequest(
            "Comanda fără cont nu este disponibilă momentan.".to_string(),
        ));
    }

    session.insert(session_keys::GUEST_CHECKOUT, true).await?;
    let controller = controller(&state, &session, user.as_ref()).await?;
    Ok(Json(view(&state, &controller)))
}

/// Submit the checkout form and place the order.
#[instrument(skip(state, session, user, visitor, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    mut visitor: Visitor,
    Json(form): Json<CheckoutForm>,
) -> Result<Response> {
    let mut controller = controller(&state, &session, user.as_ref()).await?;

    let placed = place_order(
        &mut controller,
        &mut visitor.storage,
        form,
        state.config().shipping,
        state.stores().orders.as_ref(),
        state.checkout_urls(),
        Utc::now(),
    )
    .await?;

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", placed.order.order_number.as_str())]),
    );

    let headers = visitor.save().await?;
    let body = CheckoutResponse {
        phase: controller.phase(),
        order_number: placed.order.order_number,
        redirect_url: placed.redirect_url,
    };
    Ok((headers, Json(body)).into_response())
}
