//! Integration tests for the storefront cart API.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//!   (cargo run -p suburbia-cli -- migrate storefront)
//! - The storefront server running (cargo run -p suburbia-storefront)
//!
//! Run with: cargo test -p suburbia-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::expect_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use suburbia_cart_sync::{
    Cart, DEFAULT_IDENTITY_HEADER, HttpCartStore, MemoryCartStore, RemoteCartStore,
    identity_channel,
};
use suburbia_core::{Identity, UserId};
use suburbia_integration_tests::{board, cart_of, storefront_base_url};

/// A user id no other test run will touch.
fn fresh_user() -> String {
    format!("it-{}", Uuid::new_v4())
}

fn cart_url() -> String {
    format!("{}/api/cart", storefront_base_url())
}

fn item(id: &str, quantity: u32) -> Value {
    json!({
        "id": id,
        "deck": { "id": "d", "name": "Deck", "texture": "/deck.png" },
        "wheel": { "id": "w", "name": "Wheel", "texture": "/wheel.png" },
        "truck": { "id": "t", "name": "Truck", "color": "#6F6E6A" },
        "bolt": { "id": "b", "name": "Bolt", "color": "#000000" },
        "price": 7999,
        "quantity": quantity,
    })
}

// ============================================================================
// Raw HTTP
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_health() {
    let resp = Client::new()
        .get(format!("{}/health/ready", storefront_base_url()))
        .send()
        .await
        .expect("Failed to reach storefront");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_requires_identity() {
    let resp = Client::new()
        .get(cart_url())
        .send()
        .await
        .expect("Failed to reach storefront");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_put_get_delete() {
    let client = Client::new();
    let user = fresh_user();

    // Unknown user reads as empty
    let resp = client
        .get(cart_url())
        .header(DEFAULT_IDENTITY_HEADER, &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "items": [] }));

    let cart = json!({ "items": [item("d-w-t-b", 2)] });
    let resp = client
        .put(cart_url())
        .header(DEFAULT_IDENTITY_HEADER, &user)
        .json(&cart)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = client
        .get(cart_url())
        .header(DEFAULT_IDENTITY_HEADER, &user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, cart);

    let resp = client
        .delete(cart_url())
        .header(DEFAULT_IDENTITY_HEADER, &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let body: Value = client
        .get(cart_url())
        .header(DEFAULT_IDENTITY_HEADER, &user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "items": [] }));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_rejects_duplicate_ids() {
    let resp = Client::new()
        .put(cart_url())
        .header(DEFAULT_IDENTITY_HEADER, fresh_user())
        .json(&json!({ "items": [item("x", 1), item("x", 1)] }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Through the sync engine
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_http_store_round_trip() {
    let store = HttpCartStore::new(&storefront_base_url()).unwrap();
    let user = UserId::new(fresh_user());
    let a = board("a", "w", "t", "b");
    let cart = cart_of(&[(&a, 2)]);

    assert!(store.fetch(&user).await.unwrap().is_empty());
    store.replace(&user, &cart).await.unwrap();
    assert_eq!(store.fetch(&user).await.unwrap(), cart);
    store.clear(&user).await.unwrap();
    assert!(store.fetch(&user).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_login_merge_against_live_storefront() {
    let user = fresh_user();
    let a = board("a", "w", "t", "b");
    let b = board("b", "w", "t", "b");

    let remote = HttpCartStore::new(&storefront_base_url()).unwrap();
    remote
        .replace(&UserId::new(user.clone()), &cart_of(&[(&a, 1), (&b, 1)]))
        .await
        .unwrap();

    let (publisher, observer) = identity_channel();
    let cart = Cart::new(MemoryCartStore::new(), remote.clone(), observer);

    publisher.publish_identity(Identity::Anonymous);
    cart.sync().await;
    cart.add_item(a.clone()).await;
    cart.add_item(a.clone()).await;

    publisher.publish_identity(Identity::User(UserId::new(user.clone())));
    cart.sync().await;

    let expected = cart_of(&[(&a, 3), (&b, 1)]);
    assert_eq!(&cart.snapshot(), &expected);
    assert_eq!(
        remote.fetch(&UserId::new(user.clone())).await.unwrap(),
        expected
    );
    assert!(cart.controller().local_store().raw().is_none());

    remote.clear(&UserId::new(user)).await.unwrap();
}
