//! Access-token refresh shared across concurrent requests.

#![allow(clippy::unwrap_used)]

use agroshop_core::{Identity, UserId};
use agroshop_integration_tests::{
    ACCESS_TOKEN, REFRESH_TOKEN, TestContext, bearer, cart_json, order_json,
};
use agroshop_storefront::api::{SessionEvent, TokenStore};
use agroshop_storefront::cart::CartError;
use agroshop_storefront::error::ApiError;
use httpmock::prelude::*;
use secrecy::ExposeSecret;
use serde_json::json;

const FRESH_TOKEN: &str = "access-2";
const ROTATED_REFRESH: &str = "refresh-2";

/// 401 for the stale token on both endpoints, success for the fresh one.
async fn mount_resources(ctx: &TestContext) {
    for path in ["/cart/", "/orders/"] {
        ctx.server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(path)
                    .header("Authorization", bearer(ACCESS_TOKEN));
                then.status(401)
                    .json_body(json!({"detail": "Given token not valid for any token type"}));
            })
            .await;
    }
    ctx.server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cart/")
                .header("Authorization", bearer(FRESH_TOKEN));
            then.status(200).json_body(cart_json(&[(1, "10.00", 1)]));
        })
        .await;
    ctx.server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/orders/")
                .header("Authorization", bearer(FRESH_TOKEN));
            then.status(200)
                .json_body(json!([order_json("PENDING", vec![])]));
        })
        .await;
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let ctx = TestContext::new().await;
    mount_resources(&ctx).await;
    let refresh = ctx
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/token/refresh/")
                .json_body(json!({"refresh": REFRESH_TOKEN}));
            then.status(200)
                .delay(std::time::Duration::from_millis(100))
                .json_body(json!({"access": FRESH_TOKEN, "refresh": ROTATED_REFRESH}));
        })
        .await;

    let storefront = ctx.storefront();
    let mut events = storefront.session_events();
    let tracker = storefront.orders(Identity::customer(UserId::new(1)));

    let (cart, orders) = tokio::join!(storefront.cart().fetch(), tracker.list_orders());

    assert_eq!(cart.unwrap().items().len(), 1);
    assert_eq!(orders.unwrap().len(), 1);
    assert_eq!(refresh.hits_async().await, 1);
    assert_eq!(
        ctx.tokens.access_token().unwrap().expose_secret(),
        FRESH_TOKEN
    );
    assert_eq!(
        ctx.tokens.refresh_token().unwrap().expose_secret(),
        ROTATED_REFRESH
    );
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_refresh_ends_session() {
    let ctx = TestContext::new().await;
    mount_resources(&ctx).await;
    let refresh = ctx
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/token/refresh/");
            then.status(401)
                .json_body(json!({"detail": "Token is blacklisted"}));
        })
        .await;

    let storefront = ctx.storefront();
    let mut events = storefront.session_events();

    let err = storefront.cart().fetch().await.unwrap_err();

    assert!(matches!(err, CartError::Api(ApiError::SessionExpired)));
    assert!(err.api_error().unwrap().is_auth_failure());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    assert!(ctx.tokens.access_token().is_none());
    assert!(ctx.tokens.refresh_token().is_none());
    assert!(!storefront.api().session().is_authenticated());

    // Signed out: the next command fails locally.
    let err = storefront.cart().fetch().await.unwrap_err();
    assert!(matches!(err, CartError::Api(ApiError::NotAuthenticated)));
    assert_eq!(refresh.hits_async().await, 1);
}

#[tokio::test]
async fn test_persistent_401_after_refresh_is_session_expired() {
    let ctx = TestContext::new().await;
    ctx.server
        .mock_async(|when, then| {
            when.method(GET).path("/cart/");
            then.status(401).json_body(json!({"detail": "nope"}));
        })
        .await;
    let refresh = ctx
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/token/refresh/");
            then.status(200).json_body(json!({"access": FRESH_TOKEN}));
        })
        .await;

    let storefront = ctx.storefront();
    let err = storefront.cart().fetch().await.unwrap_err();

    assert!(matches!(err, CartError::Api(ApiError::SessionExpired)));
    assert_eq!(refresh.hits_async().await, 1);
    // The refresh itself worked, so the tokens are kept.
    assert_eq!(
        ctx.tokens.access_token().unwrap().expose_secret(),
        FRESH_TOKEN
    );
    assert_eq!(
        ctx.tokens.refresh_token().unwrap().expose_secret(),
        REFRESH_TOKEN
    );
}
