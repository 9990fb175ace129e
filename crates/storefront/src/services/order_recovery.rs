//! Finding the order behind a confirmation page visit.
//!
//! The visitor's own storage layers are probed first (see
//! [`lupul_core::recovery`]), then the order record written at checkout, then
//! the remote recovery endpoint. When every source misses, a placeholder
//! order is returned so the page always renders.

use lupul_core::OrderNumber;
use lupul_core::order::{DataSource, RecoveredOrder};
use lupul_core::recovery::probe_client_storage;
use lupul_core::storage::ClientStorage;

use super::recovery_api::OrderLookup;
use crate::db::OrderStore;

/// Recover `order_number` from the first source that knows it.
///
/// Failures of the server-side sources are logged and treated as misses.
#[tracing::instrument(skip(storage, orders, lookup))]
pub async fn recover_order(
    storage: &mut ClientStorage,
    order_number: &OrderNumber,
    orders: &dyn OrderStore,
    lookup: &dyn OrderLookup,
) -> RecoveredOrder {
    if let Some(recovered) = probe_client_storage(storage, order_number) {
        return recovered;
    }

    match orders.find(order_number).await {
        Ok(Some(order)) => {
            tracing::info!("Order recovered from order record");
            return RecoveredOrder::real(order, DataSource::OrderRecord);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Order record lookup failed"),
    }

    match lookup.fetch(order_number).await {
        Ok(Some(order)) => {
            tracing::info!("Order recovered from recovery API");
            return RecoveredOrder::from_api(order);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Recovery API lookup failed"),
    }

    tracing::warn!("No source knows this order, using placeholder");
    RecoveredOrder::fallback(order_number.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use lupul_core::order::Order;
    use lupul_core::recovery::write_backups;
    use lupul_core::storage::{KeyValueStore, keys};
    use lupul_core::{OrderStatus, PaymentMethod};

    use super::*;
    use crate::db::memory::MemoryOrderStore;
    use crate::services::recovery_api::{RecoveryApiClient, RecoveryApiError};

    struct FixedLookup(Option<Order>);

    #[async_trait]
    impl OrderLookup for FixedLookup {
        async fn fetch(&self, _: &OrderNumber) -> Result<Option<Order>, RecoveryApiError> {
            Ok(self.0.clone())
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl OrderLookup for FailingLookup {
        async fn fetch(&self, _: &OrderNumber) -> Result<Option<Order>, RecoveryApiError> {
            Err(RecoveryApiError::Api {
                status: 503,
                message: "unavailable".to_owned(),
            })
        }
    }

    fn order(number: &str) -> Order {
        let mut order = Order::placeholder(OrderNumber::new(number));
        order.customer_name = "Ana Popescu".to_owned();
        order.customer_email = "ana@site.ro".to_owned();
        order.payment_method = PaymentMethod::Card;
        order.date = Some(Utc::now());
        order
    }

    #[tokio::test]
    async fn test_client_storage_wins() {
        let mut storage = ClientStorage::new();
        write_backups(&mut storage, &order("LC-1")).unwrap();
        let orders = MemoryOrderStore::default();

        let recovered = recover_order(
            &mut storage,
            &OrderNumber::new("LC-1"),
            &orders,
            &FailingLookup,
        )
        .await;
        assert_eq!(recovered.data_source, DataSource::SessionBackup);
        assert!(recovered.is_real_user_data);
    }

    #[tokio::test]
    async fn test_order_record_before_api() {
        let mut storage = ClientStorage::new();
        let orders = MemoryOrderStore::default();
        orders
            .insert(&order("LC-2"), OrderStatus::PendingPayment)
            .await
            .unwrap();

        let recovered = recover_order(
            &mut storage,
            &OrderNumber::new("LC-2"),
            &orders,
            &FixedLookup(Some(order("LC-2"))),
        )
        .await;
        assert_eq!(recovered.data_source, DataSource::OrderRecord);
        assert_eq!(recovered.order.customer_name, "Ana Popescu");
    }

    #[tokio::test]
    async fn test_api_data_is_not_real() {
        let mut storage = ClientStorage::new();
        let orders = MemoryOrderStore::default();
        orders.set_unavailable(true);

        let recovered = recover_order(
            &mut storage,
            &OrderNumber::new("LC-3"),
            &orders,
            &FixedLookup(Some(order("LC-3"))),
        )
        .await;
        assert_eq!(recovered.data_source, DataSource::ApiRecovery);
        assert!(!recovered.is_real_user_data);
        assert!(recovered.customer_recipient().is_none());
    }

    /// Serve `body` from `/get-order-details` on a local port.
    async fn serve_lookup(body: serde_json::Value) -> url::Url {
        let app = axum::Router::new().route(
            "/get-order-details",
            axum::routing::get(move || async move { axum::Json(body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        url::Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn test_bare_api_payload_is_recovered() {
        let base = serve_lookup(serde_json::json!({
            "orderNumber": "LC-5",
            "customerName": "Ana Popescu",
            "customerEmail": "ana@site.ro",
            "totalAmount": "55"
        }))
        .await;
        let lookup = RecoveryApiClient::new(Some(&base)).unwrap();
        let mut storage = ClientStorage::new();
        let orders = MemoryOrderStore::default();

        let recovered = recover_order(
            &mut storage,
            &OrderNumber::new("LC-5"),
            &orders,
            &lookup,
        )
        .await;
        assert_eq!(recovered.data_source, DataSource::ApiRecovery);
        assert_eq!(recovered.order.customer_name, "Ana Popescu");

        let json = serde_json::to_value(&recovered).unwrap();
        assert_eq!(json["dataSource"], "api-recovery");
        assert_eq!(json["isRealUserData"], false);
    }

    #[tokio::test]
    async fn test_api_answer_for_other_order_falls_back() {
        let base = serve_lookup(serde_json::json!({
            "order": { "orderNumber": "LC-OTHER", "customerName": "Ana Popescu" }
        }))
        .await;
        let lookup = RecoveryApiClient::new(Some(&base)).unwrap();
        let mut storage = ClientStorage::new();
        let orders = MemoryOrderStore::default();

        let recovered = recover_order(
            &mut storage,
            &OrderNumber::new("LC-6"),
            &orders,
            &lookup,
        )
        .await;
        assert_eq!(recovered.data_source, DataSource::Fallback);
    }

    #[tokio::test]
    async fn test_cookie_for_other_order_is_not_trusted() {
        let mut storage = ClientStorage::new();
        let cookie = lupul_core::recovery::encode_cookie(&order("LC-OTHER")).unwrap();
        storage.cookies.set("orderRecovery_LC-7", cookie);
        let orders = MemoryOrderStore::default();

        let recovered = recover_order(
            &mut storage,
            &OrderNumber::new("LC-7"),
            &orders,
            &FixedLookup(None),
        )
        .await;
        assert_eq!(recovered.data_source, DataSource::Fallback);
        assert_eq!(recovered.order.order_number.as_str(), "LC-7");
        assert!(recovered.customer_recipient().is_none());
    }

    #[tokio::test]
    async fn test_everything_missing_falls_back() {
        let mut storage = ClientStorage::new();
        storage.local.set(keys::PENDING_ORDERS, "not json".to_owned());
        let orders = MemoryOrderStore::default();

        let recovered = recover_order(
            &mut storage,
            &OrderNumber::new("LC-4"),
            &orders,
            &FailingLookup,
        )
        .await;
        assert_eq!(recovered.data_source, DataSource::Fallback);
        assert_eq!(recovered.order.customer_name, "Date lipsă");
        assert_eq!(recovered.order.customer_email, "N/A");
        assert!(!recovered.is_real_user_data);
    }
}
