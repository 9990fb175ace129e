//! Order recovery from the visitor's own storage.
//!
//! A card payment sends the visitor to the payment provider and back with
//! only the order number in the URL. Before leaving, checkout writes the
//! order to several places ([`write_backups`]); on return,
//! [`probe_client_storage`] looks for it in priority order and stops at the
//! first match:
//!
//! 1. session `currentOrderBackup`, if its order number matches
//! 2. cookie `orderRecovery_<id>`, if its order number matches: restores the
//!    session backup, cookie deleted
//! 3. local `pendingOrders[id]`: entry deleted
//! 4. local `pendingOrder`, if its order number matches: slot deleted
//!
//! Server-side sources (the order record, the recovery endpoint) and the
//! placeholder fallback are tried by the caller when this returns `None`.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::OrderNumber;
use crate::order::{DataSource, Order, RecoveredOrder};
use crate::storage::{ClientStorage, KeyValueStore, keys};

/// Errors while writing or decoding backups.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// JSON encoding or decoding failed.
    #[error("invalid order backup: {0}")]
    Json(#[from] serde_json::Error),

    /// The cookie value is not valid base64.
    #[error("invalid base64 in recovery cookie: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encode an order for the recovery cookie (base64 of its JSON).
///
/// # Errors
///
/// Returns `RecoveryError::Json` if the order cannot be serialized.
pub fn encode_cookie(order: &Order) -> Result<String, RecoveryError> {
    let json = serde_json::to_vec(order)?;
    Ok(STANDARD.encode(json))
}

/// Decode a recovery cookie value.
///
/// # Errors
///
/// Returns an error if the value is not base64 or does not hold an order.
pub fn decode_cookie(value: &str) -> Result<Order, RecoveryError> {
    let bytes = STANDARD.decode(value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write every backup for an order that is about to leave for payment.
///
/// Also records the order summary under `lastOrderDetails`.
///
/// # Errors
///
/// Returns `RecoveryError::Json` if the order cannot be serialized.
pub fn write_backups(storage: &mut ClientStorage, order: &Order) -> Result<(), RecoveryError> {
    storage
        .session
        .set_json(keys::CURRENT_ORDER_BACKUP, order)?;

    let cookie = encode_cookie(order)?;
    storage
        .cookies
        .set(&keys::recovery_cookie(&order.order_number), cookie);

    let mut pending = read_pending_orders(storage);
    pending.insert(order.order_number.as_str().to_owned(), order.clone());
    storage.local.set_json(keys::PENDING_ORDERS, &pending)?;

    storage
        .local
        .set_json(keys::LAST_ORDER_DETAILS, &order.summary())?;
    Ok(())
}

/// Look for `order_number` in the visitor's storage layers.
///
/// Unreadable entries are logged and skipped, never fatal.
pub fn probe_client_storage(
    storage: &mut ClientStorage,
    order_number: &OrderNumber,
) -> Option<RecoveredOrder> {
    from_session(storage, order_number)
        .or_else(|| from_cookie(storage, order_number))
        .or_else(|| from_pending_orders(storage, order_number))
        .or_else(|| from_legacy_slot(storage, order_number))
}

fn from_session(storage: &ClientStorage, order_number: &OrderNumber) -> Option<RecoveredOrder> {
    match storage.session.get_json::<Order>(keys::CURRENT_ORDER_BACKUP) {
        Ok(Some(order)) if &order.order_number == order_number => {
            tracing::debug!(%order_number, "Order found in session backup");
            Some(RecoveredOrder::real(order, DataSource::SessionBackup))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(%order_number, error = %e, "Unreadable session order backup");
            None
        }
    }
}

fn from_cookie(storage: &mut ClientStorage, order_number: &OrderNumber) -> Option<RecoveredOrder> {
    let name = keys::recovery_cookie(order_number);
    let raw = storage.cookies.get(&name)?;

    // The cookie is single-use whether or not it decodes.
    storage.cookies.remove(&name);

    match decode_cookie(&raw) {
        Ok(order) if &order.order_number != order_number => {
            tracing::warn!(
                %order_number,
                cookie_order = %order.order_number,
                "Discarding recovery cookie holding another order"
            );
            None
        }
        Ok(order) => {
            if let Err(e) = storage
                .session
                .set_json(keys::CURRENT_ORDER_BACKUP, &order)
            {
                tracing::warn!(%order_number, error = %e, "Could not restore session backup");
            }
            tracing::info!(%order_number, "Order recovered from cookie backup");
            Some(RecoveredOrder::real(order, DataSource::CookieBackup))
        }
        Err(e) => {
            tracing::warn!(%order_number, error = %e, "Discarding unreadable recovery cookie");
            None
        }
    }
}

fn read_pending_orders(storage: &ClientStorage) -> BTreeMap<String, Order> {
    match storage
        .local
        .get_json::<BTreeMap<String, Order>>(keys::PENDING_ORDERS)
    {
        Ok(map) => map.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable pending orders");
            BTreeMap::new()
        }
    }
}

fn from_pending_orders(
    storage: &mut ClientStorage,
    order_number: &OrderNumber,
) -> Option<RecoveredOrder> {
    let mut pending = read_pending_orders(storage);
    let order = pending.remove(order_number.as_str())?;

    if pending.is_empty() {
        storage.local.remove(keys::PENDING_ORDERS);
    } else if let Err(e) = storage.local.set_json(keys::PENDING_ORDERS, &pending) {
        tracing::warn!(%order_number, error = %e, "Could not rewrite pending orders");
    }

    tracing::info!(%order_number, "Order recovered from pending orders");
    Some(RecoveredOrder::real(order, DataSource::PendingOrders))
}

fn from_legacy_slot(
    storage: &mut ClientStorage,
    order_number: &OrderNumber,
) -> Option<RecoveredOrder> {
    match storage.local.get_json::<Order>(keys::PENDING_ORDER) {
        Ok(Some(order)) if &order.order_number == order_number => {
            storage.local.remove(keys::PENDING_ORDER);
            tracing::info!(%order_number, "Order recovered from legacy pending order");
            Some(RecoveredOrder::real(order, DataSource::LegacyPendingOrder))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(%order_number, error = %e, "Unreadable legacy pending order");
            None
        }
    }
}
