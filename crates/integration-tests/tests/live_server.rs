//! Smoke tests against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`lupul-cli migrate`)
//! - The storefront running (`cargo run -p lupul-storefront`)
//!
//! Run with: `cargo test -p lupul-integration-tests -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

/// Base URL of the storefront (configurable via environment).
fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_live_readiness() {
    let resp = client()
        .get(format!("{}/health/ready", storefront_base_url()))
        .send()
        .await
        .expect("Failed to reach storefront");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_live_cart_round_trip_keeps_session() {
    let client = client();
    let base_url = storefront_base_url();

    let resp = client
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "id": "live-test", "name": "Produs de test", "price": "10" }))
        .send()
        .await
        .expect("Failed to add item");
    assert!(resp.status().is_success());

    let count: Value = client
        .get(format!("{base_url}/api/cart/count"))
        .send()
        .await
        .expect("Failed to read count")
        .json()
        .await
        .expect("Count is not JSON");
    assert_eq!(count["count"], 1);

    let _ = client.delete(format!("{base_url}/api/cart")).send().await;
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_live_unknown_order_confirmation_renders() {
    let resp = client()
        .get(format!(
            "{}/order-confirmation?orderId=LC-19700101-TEST00",
            storefront_base_url()
        ))
        .send()
        .await
        .expect("Failed to reach storefront");

    assert_eq!(resp.status(), StatusCode::OK);
}
