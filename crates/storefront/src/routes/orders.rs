//! Order confirmation handlers.
//!
//! The confirmation page is where visitors land after checkout, possibly
//! after a round trip through the payment provider. The order is recovered
//! from the first source that knows it and the confirmation email is sent
//! once. Nothing here fails the page: every lookup problem degrades to less
//! data.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use lupul_core::order::{OrderSummary, RecoveredOrder};
use lupul_core::storage::{KeyValueStore, keys};
use lupul_core::{OrderNumber, Price};

use crate::error::{AppError, Result};
use crate::services::{NotifyOutcome, Visitor, recover_order};
use crate::state::AppState;

/// Query of `GET /order-confirmation`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationQuery {
    #[serde(default)]
    pub order_id: Option<String>,
}

/// One order line on the confirmation page.
pub struct LineView {
    pub name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// Confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "order_confirmation.html")]
pub struct OrderConfirmationTemplate {
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub address: String,
    pub payment_method: &'static str,
    pub lines: Vec<LineView>,
    pub shipping: String,
    pub total: String,
    pub is_real_user_data: bool,
    pub email_sent_to_customer: bool,
}

impl OrderConfirmationTemplate {
    fn new(recovered: &RecoveredOrder, outcome: &NotifyOutcome) -> Self {
        let order = &recovered.order;
        Self {
            order_number: order.order_number.to_string(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            customer_phone: order.customer_phone.clone(),
            address: format!(
                "{}, {}, {}",
                order.customer_address, order.customer_city, order.customer_county
            ),
            payment_method: order.payment_method.label(),
            lines: order
                .items
                .iter()
                .map(|item| LineView {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: Price::ron(item.price).display(),
                    line_total: Price::ron(item.line_total()).display(),
                })
                .collect(),
            shipping: Price::ron(order.shipping_cost).display(),
            total: Price::ron(order.total_amount).display(),
            is_real_user_data: recovered.is_real_user_data,
            email_sent_to_customer: matches!(
                outcome,
                NotifyOutcome::Sent {
                    to_admin: false,
                    ..
                }
            ),
        }
    }
}

/// Recover the order, send its email and persist the visitor's storage.
///
/// The email is built from the full order; the returned order is the
/// visitor's view of it.
async fn confirm(
    state: &AppState,
    mut visitor: Visitor,
    order_number: &OrderNumber,
) -> (RecoveredOrder, NotifyOutcome, HeaderMap) {
    let recovered = recover_order(
        &mut visitor.storage,
        order_number,
        state.stores().orders.as_ref(),
        state.order_lookup(),
    )
    .await;

    let outcome = state.notifier().notify(&recovered).await;

    let headers = visitor.save().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to persist visitor storage after recovery");
        HeaderMap::new()
    });

    (recovered.for_visitor(), outcome, headers)
}

fn order_number(raw: Option<&str>) -> Result<OrderNumber> {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(OrderNumber::new(id)),
        _ => Err(AppError::BadRequest(
            "Numărul comenzii lipsește.".to_string(),
        )),
    }
}

/// Order confirmation page.
#[instrument(skip(state, visitor))]
pub async fn confirmation_page(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<ConfirmationQuery>,
) -> Result<Response> {
    let order_number = order_number(query.order_id.as_deref())?;
    let (recovered, outcome, headers) = confirm(&state, visitor, &order_number).await;

    tracing::info!(
        %order_number,
        data_source = %recovered.data_source,
        "Order confirmation shown"
    );
    Ok((headers, OrderConfirmationTemplate::new(&recovered, &outcome)).into_response())
}

/// Order confirmation as JSON.
#[instrument(skip(state, visitor))]
pub async fn confirmation_json(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Response> {
    let order_number = order_number(Some(&id))?;
    let (recovered, _, headers) = confirm(&state, visitor, &order_number).await;
    Ok((headers, Json(recovered)).into_response())
}

/// Summary of the visitor's most recent order.
#[instrument(skip(visitor))]
pub async fn last(visitor: Visitor) -> Result<Json<OrderSummary>> {
    match visitor
        .storage
        .local
        .get_json::<OrderSummary>(keys::LAST_ORDER_DETAILS)
    {
        Ok(Some(summary)) => Ok(Json(summary)),
        Ok(None) => Err(AppError::NotFound("ultima comandă".to_string())),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable last order details");
            Err(AppError::NotFound("ultima comandă".to_string()))
        }
    }
}
