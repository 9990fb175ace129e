//! Cart API tests.
//!
//! Totals are recomputed on every change: shipping is 15 lei below a
//! 200 lei subtotal and free from there on.

use lupul_integration_tests::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_empty_cart_has_no_total_but_shows_fee() {
    let app = TestApp::new();
    let client = app.client();

    let cart = client.get("/api/cart").await.json();

    assert_eq!(cart["items"], json!([]));
    assert_eq!(cart["totalItems"], 0);
    assert!(cart["total"].is_null());
    assert!(cart["finalTotal"].is_null());
    assert_eq!(cart["shippingCost"], "15");
}

#[tokio::test]
async fn test_adding_items_updates_totals_and_shipping() {
    let app = TestApp::new();
    let client = app.client();

    let response = client
        .post(
            "/api/cart/items",
            json!({ "id": "miere-salcam", "name": "Miere de salcâm", "price": "60", "quantity": 2 }),
        )
        .await;
    assert!(response.status.is_success());
    let cart = response.json();
    assert_eq!(cart["totalItems"], 2);
    assert_eq!(cart["total"], "120");
    assert_eq!(cart["shippingCost"], "15");
    assert_eq!(cart["finalTotal"], "135");

    let cart = client
        .post(
            "/api/cart/items",
            json!({ "id": "propolis", "name": "Tinctură de propolis", "price": "100" }),
        )
        .await
        .json();
    assert_eq!(cart["totalItems"], 3);
    assert_eq!(cart["total"], "220");
    assert_eq!(cart["shippingCost"], "0");
    assert_eq!(cart["finalTotal"], "220");
}

#[tokio::test]
async fn test_adding_same_product_merges_lines() {
    let app = TestApp::new();
    let client = app.client();
    let item = json!({ "id": "miere-tei", "name": "Miere de tei", "price": "45" });

    client.post("/api/cart/items", item.clone()).await;
    let cart = client.post("/api/cart/items", item).await.json();

    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["items"][0]["quantity"], 2);
    assert_eq!(cart["totalItems"], 2);
}

#[tokio::test]
async fn test_cart_survives_between_requests() {
    let app = TestApp::new();
    let client = app.client();

    client
        .post("/api/cart/items", json!({ "id": "ceara", "name": "Lumânare din ceară", "price": "30" }))
        .await;

    let count = client.get("/api/cart/count").await.json();
    assert_eq!(count["count"], 1);

    // Another browser has its own cart.
    let other = app.client();
    assert_eq!(other.get("/api/cart/count").await.json()["count"], 0);
}

#[tokio::test]
async fn test_update_quantity_remove_and_clear() {
    let app = TestApp::new();
    let client = app.client();
    client
        .post("/api/cart/items", json!({ "id": "a", "name": "A", "price": "10" }))
        .await;
    client
        .post("/api/cart/items", json!({ "id": "b", "name": "B", "price": "20" }))
        .await;

    let cart = client
        .patch("/api/cart/items/a", json!({ "quantity": 5 }))
        .await
        .json();
    assert_eq!(cart["totalItems"], 6);
    assert_eq!(cart["total"], "70");

    // Quantities never drop below one.
    let cart = client
        .patch("/api/cart/items/a", json!({ "quantity": 0 }))
        .await
        .json();
    assert_eq!(cart["items"][0]["quantity"], 1);

    // Unknown products leave the cart as is.
    let response = client
        .patch("/api/cart/items/nope", json!({ "quantity": 3 }))
        .await;
    assert!(response.status.is_success());
    assert_eq!(response.json()["totalItems"], 2);

    let cart = client.delete("/api/cart/items/a").await.json();
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["items"][0]["id"], "b");

    let cart = client.delete("/api/cart").await.json();
    assert_eq!(cart["totalItems"], 0);
    assert!(cart["total"].is_null());
}
