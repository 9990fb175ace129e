//! Cart route handlers.
//!
//! The cart lives in the visitor's durable storage under `cart`. Every
//! handler opens it, applies one change and answers with the whole cart and
//! its derived totals.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use lupul_core::ProductId;
use lupul_core::cart::{Cart, CartItem, CartStore};
use lupul_core::storage::MemoryStore;

use crate::error::Result;
use crate::services::Visitor;
use crate::state::AppState;

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub image: Option<String>,
    /// Defaults to 1.
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// Body of `PATCH /api/cart/items/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

fn open<'a>(visitor: &'a mut Visitor, state: &AppState) -> CartStore<&'a mut MemoryStore> {
    CartStore::open(&mut visitor.storage.local, state.config().shipping)
}

/// Persist the visitor and answer with the cart.
async fn respond(visitor: Visitor, cart: Cart) -> Result<Response> {
    let headers = visitor.save().await?;
    Ok((headers, Json(cart)).into_response())
}

/// Show the cart.
#[instrument(skip(state, visitor))]
pub async fn show(State(state): State<AppState>, mut visitor: Visitor) -> Json<Cart> {
    let (cart, _) = open(&mut visitor, &state).into_parts();
    Json(cart)
}

/// Add an item, merging with an existing line of the same product.
#[instrument(skip(state, visitor, request), fields(product_id = %request.id))]
pub async fn add(
    State(state): State<AppState>,
    mut visitor: Visitor,
    Json(request): Json<AddItemRequest>,
) -> Result<Response> {
    let mut store = open(&mut visitor, &state);
    store.add_item(CartItem {
        id: request.id,
        name: request.name,
        price: request.price,
        image: request.image,
        quantity: request.quantity.unwrap_or(1),
    })?;
    let (cart, _) = store.into_parts();

    tracing::info!(total_items = cart.totals().total_items, "Item added to cart");
    respond(visitor, cart).await
}

/// Change a line's quantity. Unknown products leave the cart as is.
#[instrument(skip(state, visitor, request))]
pub async fn update(
    State(state): State<AppState>,
    mut visitor: Visitor,
    Path(id): Path<ProductId>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Response> {
    let mut store = open(&mut visitor, &state);
    if !store.update_quantity(&id, request.quantity)? {
        tracing::debug!(product_id = %id, "Quantity update for product not in cart");
    }
    let (cart, _) = store.into_parts();
    respond(visitor, cart).await
}

/// Remove a line.
#[instrument(skip(state, visitor))]
pub async fn remove(
    State(state): State<AppState>,
    mut visitor: Visitor,
    Path(id): Path<ProductId>,
) -> Result<Response> {
    let mut store = open(&mut visitor, &state);
    store.remove_item(&id)?;
    let (cart, _) = store.into_parts();
    respond(visitor, cart).await
}

/// Empty the cart.
#[instrument(skip(state, visitor))]
pub async fn clear(State(state): State<AppState>, mut visitor: Visitor) -> Result<Response> {
    let mut store = open(&mut visitor, &state);
    store.clear()?;
    let (cart, _) = store.into_parts();
    respond(visitor, cart).await
}

/// Number of units in the cart, for the header badge.
#[instrument(skip(state, visitor))]
pub async fn count(State(state): State<AppState>, mut visitor: Visitor) -> Json<serde_json::Value> {
    let (cart, _) = open(&mut visitor, &state).into_parts();
    Json(serde_json::json!({ "count": cart.totals().total_items }))
}
