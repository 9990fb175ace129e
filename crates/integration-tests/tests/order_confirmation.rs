//! Order confirmation and recovery tests.
//!
//! The confirmation page must render for any order id and the confirmation
//! email must go out exactly once per order, whichever source the order
//! data came from.

use axum::http::StatusCode;
use lupul_integration_tests::{
    ADMIN_EMAIL, TestApp, TestAppOptions, TestClient, valid_checkout_form,
};
use serde_json::{Value, json};
use url::Url;

async fn place_order(client: &TestClient) -> String {
    client
        .post(
            "/api/cart/items",
            json!({ "id": "miere-salcam", "name": "Miere de salcâm", "price": "60", "quantity": 2 }),
        )
        .await;
    client.post("/api/checkout/guest", json!({})).await;
    let body = client
        .post("/api/checkout", valid_checkout_form("ramburs"))
        .await
        .json();
    body["orderNumber"].as_str().unwrap_or_default().to_owned()
}

async fn confirmation(client: &TestClient, number: &str) -> Value {
    let response = client
        .get(&format!("/api/orders/{number}/confirmation"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    response.json()
}

#[tokio::test]
async fn test_confirmation_page_uses_session_backup_and_mails_once() {
    let app = TestApp::new();
    let client = app.client();
    let number = place_order(&client).await;

    let page = client
        .get(&format!("/order-confirmation?orderId={number}"))
        .await;
    assert_eq!(page.status, StatusCode::OK);
    let html = page.text();
    assert!(html.contains(&number));
    assert!(html.contains("Ioana Popescu"));

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to.as_str(), "ioana@example.ro");
    assert!(sent[0].subject.contains(&number));

    // Reloading the page does not mail again.
    let again = confirmation(&client, &number).await;
    assert_eq!(again["dataSource"], "session-backup");
    assert_eq!(again["isRealUserData"], true);
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_recovery_cookie_restores_order_in_another_session() {
    let app = TestApp::new();
    let buyer = app.client();
    let number = place_order(&buyer).await;
    let cookie_name = format!("orderRecovery_{number}");
    let cookie = buyer.cookie(&cookie_name).unwrap_or_default();
    assert!(!cookie.is_empty());

    // Same browser after the session expired: only the cookie is left.
    let returning = app.client();
    returning.set_cookie(&cookie_name, &cookie);

    let body = confirmation(&returning, &number).await;
    assert_eq!(body["dataSource"], "cookie-backup");
    assert_eq!(body["customerName"], "Ioana Popescu");

    // The cookie is single-use.
    assert!(returning.cookie(&cookie_name).is_none());
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_order_record_hides_contact_details_from_other_devices() {
    let app = TestApp::new();
    let buyer = app.client();
    let number = place_order(&buyer).await;

    let other_device = app.client();
    let body = confirmation(&other_device, &number).await;

    assert_eq!(body["dataSource"], "order-record");
    assert_eq!(body["isRealUserData"], false);
    assert_eq!(body["orderNumber"], number.as_str());
    assert_eq!(body["customerName"], "N/A");
    assert_eq!(body["customerEmail"], "N/A");
    assert_eq!(body["customerPhone"], "N/A");
    assert_eq!(body["customerAddress"], "N/A");
    assert!(!body["items"].as_array().unwrap().is_empty());

    // The customer still gets the email, sent from the stored record.
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to.as_str(), "ioana@example.ro");

    // The buyer's own visit afterwards does not send a second email.
    confirmation(&buyer, &number).await;
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to.as_str(), "ioana@example.ro");
}

#[tokio::test]
async fn test_unknown_order_falls_back_and_alerts_admin_once() {
    let app = TestApp::with_options(TestAppOptions {
        // Nothing listens here, so the recovery endpoint is unreachable.
        order_recovery_url: Url::parse("http://127.0.0.1:9").ok(),
        ..TestAppOptions::default()
    });
    let client = app.client();

    let body = confirmation(&client, "LC-20260101-ZZZZZZ").await;
    assert_eq!(body["dataSource"], "fallback");
    assert_eq!(body["isRealUserData"], false);
    assert_eq!(body["customerName"], "Date lipsă");
    assert_eq!(body["customerEmail"], "N/A");

    let page = client
        .get("/order-confirmation?orderId=LC-20260101-ZZZZZZ")
        .await;
    assert_eq!(page.status, StatusCode::OK);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to.as_str(), ADMIN_EMAIL);
    assert!(sent[0].subject.starts_with("[ATENȚIE: date incomplete]"));
}

#[tokio::test]
async fn test_confirmation_page_requires_order_id() {
    let app = TestApp::new();
    let client = app.client();

    let response = client.get("/order-confirmation").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = client.get("/order-confirmation?orderId=%20").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_failed_email_is_retried_on_next_visit() {
    let app = TestApp::new();
    let client = app.client();
    let number = place_order(&client).await;

    app.mailer.set_failing(true);
    confirmation(&client, &number).await;
    assert!(app.mailer.sent().is_empty());

    app.mailer.set_failing(false);
    confirmation(&client, &number).await;
    assert_eq!(app.mailer.sent().len(), 1);
}
