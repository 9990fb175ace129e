//! Checkout flow tests.

use axum::http::StatusCode;
use lupul_core::OrderNumber;
use lupul_storefront::db::OrderStore;
use lupul_integration_tests::{BASE_URL, TestApp, TestAppOptions, valid_checkout_form};
use serde_json::json;
use url::Url;

async fn fill_cart(client: &lupul_integration_tests::TestClient) {
    client
        .post(
            "/api/cart/items",
            json!({ "id": "miere-salcam", "name": "Miere de salcâm", "price": "60", "quantity": 2 }),
        )
        .await;
}

#[tokio::test]
async fn test_anonymous_visitor_is_blocked_until_guest_checkout() {
    let app = TestApp::new();
    let client = app.client();
    fill_cart(&client).await;

    let view = client.get("/api/checkout").await.json();
    assert_eq!(view["phase"], "blocked");
    assert_eq!(view["guestCheckoutAvailable"], true);

    let response = client.post("/api/checkout", valid_checkout_form("ramburs")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let view = client.post("/api/checkout/guest", json!({})).await.json();
    assert_eq!(view["phase"], "guest_form_open");
}

#[tokio::test]
async fn test_guest_checkout_disabled() {
    let app = TestApp::with_options(TestAppOptions {
        guest_checkout: false,
        ..TestAppOptions::default()
    });
    let client = app.client();

    let response = client.post("/api/checkout/guest", json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(client.get("/api/checkout").await.json()["phase"], "blocked");
}

#[tokio::test]
async fn test_signed_in_user_gets_prefilled_form() {
    let app = TestApp::new();
    let client = app.client();
    assert!(client.sign_in("ana").await.status.is_success());

    let view = client.get("/api/checkout").await.json();
    assert_eq!(view["phase"], "form_filled");
    assert_eq!(view["form"]["email"], "ana@example.ro");
    assert_eq!(view["form"]["name"], "Utilizator ana");
}

#[tokio::test]
async fn test_invalid_form_lists_fields_and_keeps_cart() {
    let app = TestApp::new();
    let client = app.client();
    fill_cart(&client).await;
    client.post("/api/checkout/guest", json!({})).await;

    let mut form = valid_checkout_form("ramburs");
    form["email"] = json!("not-an-email");
    form["phone"] = json!("");
    let response = client.post("/api/checkout", form).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json();
    assert!(body["fields"].get("email").is_some());
    assert!(body["fields"].get("phone").is_some());
    assert_eq!(client.get("/api/cart/count").await.json()["count"], 2);
}

#[tokio::test]
async fn test_empty_cart_cannot_be_ordered() {
    let app = TestApp::new();
    let client = app.client();
    client.post("/api/checkout/guest", json!({})).await;

    let response = client.post("/api/checkout", valid_checkout_form("ramburs")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cash_on_delivery_order_is_placed() {
    let app = TestApp::new();
    let client = app.client();
    fill_cart(&client).await;
    client.post("/api/checkout/guest", json!({})).await;

    let response = client.post("/api/checkout", valid_checkout_form("ramburs")).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["phase"], "succeeded");

    let number = body["orderNumber"].as_str().unwrap_or_default().to_owned();
    assert!(number.starts_with("LC-"), "unexpected order number {number}");
    assert_eq!(number.len(), "LC-20260101-ABCDEF".len());

    let redirect = body["redirectUrl"].as_str().unwrap_or_default();
    assert!(redirect.starts_with(BASE_URL));
    assert!(redirect.contains(&format!("orderId={number}")));

    // Order record written, cart emptied, summary kept.
    let stored = app
        .stores
        .orders
        .find(&OrderNumber::new(number.clone()))
        .await
        .ok()
        .flatten();
    let stored = stored.map(|order| (order.customer_name, order.total_amount.to_string()));
    assert_eq!(stored, Some(("Ioana Popescu".to_owned(), "135".to_owned())));

    assert_eq!(client.get("/api/cart/count").await.json()["count"], 0);

    let last = client.get("/api/orders/last").await.json();
    assert_eq!(last["orderNumber"], number.as_str());

    // A recovery cookie was handed out.
    assert!(client.cookie(&format!("orderRecovery_{number}")).is_some());
}

#[tokio::test]
async fn test_card_order_redirects_to_payment() {
    let app = TestApp::with_options(TestAppOptions {
        payment_redirect_url: Url::parse("https://plati.test/start").ok(),
        ..TestAppOptions::default()
    });
    let client = app.client();
    fill_cart(&client).await;
    client.post("/api/checkout/guest", json!({})).await;

    let body = client
        .post("/api/checkout", valid_checkout_form("card"))
        .await
        .json();

    let redirect = Url::parse(body["redirectUrl"].as_str().unwrap_or_default());
    let Ok(redirect) = redirect else {
        panic!("redirect is not a URL: {body}");
    };
    assert_eq!(redirect.host_str(), Some("plati.test"));
    let pairs: Vec<(String, String)> = redirect.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("amount".to_owned(), "135".to_owned())));
    assert!(
        pairs
            .iter()
            .any(|(k, v)| k == "returnUrl" && v.starts_with(BASE_URL))
    );
}

#[tokio::test]
async fn test_no_last_order_before_checkout() {
    let app = TestApp::new();
    let client = app.client();

    let response = client.get("/api/orders/last").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
