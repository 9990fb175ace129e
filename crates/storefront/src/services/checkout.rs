//! Placing an order.
//!
//! The checkout controller validates the form against the visitor's cart.
//! A valid submission becomes the authoritative order record, the recovery
//! backups are written to the visitor's storage, and the cart is emptied.
//! Card payments leave for the payment provider; everything else goes
//! straight to the confirmation page.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use thiserror::Error;
use url::Url;

use lupul_core::cart::{CartError, CartStore, ShippingPolicy};
use lupul_core::checkout::{CheckoutController, CheckoutError, CheckoutForm};
use lupul_core::order::Order;
use lupul_core::recovery::{RecoveryError, write_backups};
use lupul_core::storage::ClientStorage;
use lupul_core::{OrderNumber, OrderStatus};

use crate::db::{OrderStore, RepositoryError};

/// Characters of the random order number suffix (no 0/O, 1/I).
const ORDER_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of the random order number suffix.
const ORDER_SUFFIX_LEN: usize = 6;

/// Attempts at finding an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Errors while placing an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// The form or the controller phase rejected the submission.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// The order record could not be written.
    #[error("failed to store order: {0}")]
    Repository(#[from] RepositoryError),

    /// The recovery backups could not be written.
    #[error("failed to write order backups: {0}")]
    Backup(#[from] RecoveryError),

    /// The cart could not be cleared.
    #[error("failed to clear cart: {0}")]
    Cart(#[from] CartError),
}

/// Generate an order number like `LC-20260314-K7MQ2X`.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> OrderNumber {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .filter_map(|_| ORDER_SUFFIX_CHARSET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect();
    OrderNumber::new(format!("LC-{}-{suffix}", now.format("%Y%m%d")))
}

/// Where visitors go after checkout.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Public base URL of the storefront.
    pub base_url: Url,
    /// Payment provider entry point; without it card orders confirm directly.
    pub payment_url: Option<Url>,
}

impl CheckoutUrls {
    /// Confirmation page of an order.
    #[must_use]
    pub fn confirmation(&self, order_number: &OrderNumber) -> String {
        let mut url = self.base_url.clone();
        url.set_path("/order-confirmation");
        url.query_pairs_mut()
            .clear()
            .append_pair("orderId", order_number.as_str());
        url.into()
    }

    /// Where to send the visitor once `order` is placed.
    #[must_use]
    pub fn after_checkout(&self, order: &Order) -> String {
        let confirmation = self.confirmation(&order.order_number);
        match &self.payment_url {
            Some(payment) if order.payment_method.requires_redirect() => {
                let mut url = payment.clone();
                url.query_pairs_mut()
                    .append_pair("orderId", order.order_number.as_str())
                    .append_pair("amount", &order.total_amount.round_dp(2).to_string())
                    .append_pair("returnUrl", &confirmation);
                url.into()
            }
            _ => confirmation,
        }
    }
}

/// A placed order and where the visitor goes next.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub redirect_url: String,
}

/// Submit the checkout and place the order.
///
/// On any failure before the order record is written the controller moves
/// to `Failed` and the cart is left untouched.
///
/// # Errors
///
/// Returns `PlaceOrderError::Checkout` for rejected submissions and the
/// storage variants when the order cannot be persisted.
#[tracing::instrument(skip_all)]
pub async fn place_order(
    controller: &mut CheckoutController,
    storage: &mut ClientStorage,
    form: CheckoutForm,
    policy: ShippingPolicy,
    orders: &dyn OrderStore,
    urls: &CheckoutUrls,
    now: DateTime<Utc>,
) -> Result<PlacedOrder, PlaceOrderError> {
    controller.fill(form)?;

    let submission = {
        let cart = CartStore::open(&mut storage.local, policy);
        controller.submit(cart.cart())?
    };

    let status = OrderStatus::initial_for(submission.form.payment_method);
    let mut attempt = 0;
    let order = loop {
        attempt += 1;
        let order = Order::from_submission(generate_order_number(now), &submission, now);
        match orders.insert(&order, status).await {
            Ok(()) => break order,
            Err(RepositoryError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(order_number = %order.order_number, "Order number taken, retrying");
            }
            Err(e) => {
                controller.complete(false);
                return Err(e.into());
            }
        }
    };

    tracing::info!(
        order_number = %order.order_number,
        payment_method = order.payment_method.as_str(),
        total = %order.total_amount,
        "Order placed"
    );

    // The order exists from here on; backup or cart failures do not undo it.
    controller.complete(true);
    write_backups(storage, &order)?;
    CartStore::open(&mut storage.local, policy).clear()?;

    let redirect_url = urls.after_checkout(&order);
    Ok(PlacedOrder {
        order,
        redirect_url,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lupul_core::cart::CartItem;
    use lupul_core::checkout::{AuthState, CheckoutPhase};
    use lupul_core::order::OrderItem;
    use lupul_core::storage::{KeyValueStore, keys};
    use lupul_core::{PaymentMethod, ProductId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::memory::MemoryOrderStore;

    fn urls(payment: Option<&str>) -> CheckoutUrls {
        CheckoutUrls {
            base_url: Url::parse("https://lupulsicorbul.ro").unwrap(),
            payment_url: payment.map(|p| Url::parse(p).unwrap()),
        }
    }

    fn form(method: PaymentMethod) -> CheckoutForm {
        CheckoutForm {
            name: "Ana Popescu".to_owned(),
            email: "ana@site.ro".to_owned(),
            phone: "0722000000".to_owned(),
            address: "Str. Lupului 1".to_owned(),
            city: "Cluj-Napoca".to_owned(),
            county: "Cluj".to_owned(),
            payment_method: Some(method),
            ..CheckoutForm::default()
        }
    }

    fn storage_with_cart() -> ClientStorage {
        let mut storage = ClientStorage::new();
        let mut cart = CartStore::open(&mut storage.local, ShippingPolicy::default());
        cart.add_item(CartItem {
            id: ProductId::new("runa"),
            name: "Runa".to_owned(),
            price: Some(Decimal::new(10, 0)),
            image: None,
            quantity: 2,
        })
        .unwrap();
        storage
    }

    #[test]
    fn test_order_number_format() {
        let now = DateTime::parse_from_rfc3339("2026-03-14T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let number = generate_order_number(now);
        let (prefix, suffix) = number.as_str().split_at(12);
        assert_eq!(prefix, "LC-20260314-");
        assert_eq!(suffix.len(), ORDER_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| ORDER_SUFFIX_CHARSET.contains(&b)));
    }

    #[test]
    fn test_after_checkout_urls() {
        let mut order = Order::placeholder(OrderNumber::new("LC-1"));
        order.total_amount = Decimal::new(3500, 2);

        order.payment_method = PaymentMethod::CashOnDelivery;
        let urls = urls(Some("https://pay.example.ro/start"));
        assert_eq!(
            urls.after_checkout(&order),
            "https://lupulsicorbul.ro/order-confirmation?orderId=LC-1"
        );

        order.payment_method = PaymentMethod::Card;
        let redirect = urls.after_checkout(&order);
        assert!(redirect.starts_with("https://pay.example.ro/start?orderId=LC-1&amount=35.00&returnUrl="));
        assert!(redirect.contains("order-confirmation%3ForderId%3DLC-1"));
    }

    #[tokio::test]
    async fn test_place_order_writes_everything() {
        let orders = MemoryOrderStore::default();
        let mut storage = storage_with_cart();
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);

        let placed = place_order(
            &mut controller,
            &mut storage,
            form(PaymentMethod::Card),
            ShippingPolicy::default(),
            &orders,
            &urls(None),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(controller.phase(), CheckoutPhase::Succeeded);
        assert_eq!(placed.order.total_amount, Decimal::new(35, 0));
        assert_eq!(
            placed.order.items,
            vec![OrderItem {
                id: ProductId::new("runa"),
                name: "Runa".to_owned(),
                price: Decimal::new(10, 0),
                quantity: 2,
            }]
        );
        assert_eq!(
            orders.status(&placed.order.order_number).await,
            Some(OrderStatus::PendingPayment)
        );
        assert!(storage.session.contains(keys::CURRENT_ORDER_BACKUP));
        assert!(storage.local.contains(keys::PENDING_ORDERS));
        assert!(storage.local.contains(keys::LAST_ORDER_DETAILS));
        assert!(
            storage
                .cookies
                .contains(&keys::recovery_cookie(&placed.order.order_number))
        );
        assert_eq!(storage.local.get(keys::CART).as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_cart() {
        let orders = MemoryOrderStore::default();
        orders.set_unavailable(true);
        let mut storage = storage_with_cart();
        let cart_before = storage.local.get(keys::CART);
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);

        let result = place_order(
            &mut controller,
            &mut storage,
            form(PaymentMethod::CashOnDelivery),
            ShippingPolicy::default(),
            &orders,
            &urls(None),
            Utc::now(),
        )
        .await;

        assert!(matches!(result, Err(PlaceOrderError::Repository(_))));
        assert_eq!(controller.phase(), CheckoutPhase::Failed);
        assert_eq!(storage.local.get(keys::CART), cart_before);
        assert!(!storage.local.contains(keys::PENDING_ORDERS));
    }

    #[tokio::test]
    async fn test_invalid_form_is_rejected() {
        let orders = MemoryOrderStore::default();
        let mut storage = storage_with_cart();
        let mut controller = CheckoutController::new(&AuthState::Anonymous, true);
        let mut bad = form(PaymentMethod::Card);
        bad.email = "not-an-email".to_owned();

        let result = place_order(
            &mut controller,
            &mut storage,
            bad,
            ShippingPolicy::default(),
            &orders,
            &urls(None),
            Utc::now(),
        )
        .await;

        match result {
            Err(PlaceOrderError::Checkout(CheckoutError::Invalid(errors))) => {
                assert!(errors.contains("email"));
            }
            other => panic!("expected invalid form, got {other:?}"),
        }
        assert!(orders.is_empty().await);
    }
}
