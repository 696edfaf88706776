//! Integration tests for the Agroshop storefront client.
//!
//! Each test starts an `httpmock` server standing in for the REST API and
//! drives the real client stack against it.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p agroshop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - Cart commands, refetch and selection
//! - `checkout` - Checkout state machine and payment initiation
//! - `order_tracker` - Customer cancel and vendor status updates
//! - `token_refresh` - Shared 401 refresh and forced logout

use std::sync::Arc;
use std::time::Duration;

use agroshop_storefront::Storefront;
use agroshop_storefront::api::MemoryTokenStore;
use agroshop_storefront::config::StorefrontConfig;
use httpmock::MockServer;
use secrecy::SecretString;
use serde_json::{Value, json};

/// Access token the mock server accepts.
pub const ACCESS_TOKEN: &str = "access-1";

/// Refresh token handed to the client.
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Order UUID used by the fixtures.
pub const ORDER_ID: &str = "6f1c2a3e-7b4d-4c1a-9e2f-0a1b2c3d4e5f";

/// Post-checkout refresh delay used in tests.
pub const REFRESH_DELAY: Duration = Duration::from_millis(20);

/// A mock API server plus the token store the client reads.
pub struct TestContext {
    pub server: MockServer,
    pub tokens: Arc<MemoryTokenStore>,
}

impl TestContext {
    /// Start a mock server with a signed-in token store.
    pub async fn new() -> Self {
        Self {
            server: MockServer::start_async().await,
            tokens: Arc::new(MemoryTokenStore::new(
                Some(SecretString::from(ACCESS_TOKEN)),
                Some(SecretString::from(REFRESH_TOKEN)),
            )),
        }
    }

    /// Configuration pointing at the mock server.
    ///
    /// # Panics
    ///
    /// Panics if the mock server URL does not parse.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let mut config = StorefrontConfig::for_base_url(&self.server.base_url())
            .expect("mock server URL should parse");
        config.checkout.refresh_delay = REFRESH_DELAY;
        config
    }

    /// Client stack pointing at the mock server.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn storefront(&self) -> Storefront {
        Storefront::new(self.config(), self.tokens.clone()).expect("client should build")
    }
}

/// Bearer header value for a token.
#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// A cart payload with `(item_id, price, quantity)` lines. Product IDs are
/// the item ID times ten.
#[must_use]
pub fn cart_json(lines: &[(i64, &str, u32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, price, quantity)| {
            json!({
                "id": id,
                "product": {
                    "id": id * 10,
                    "name": format!("Product {id}"),
                    "price": price,
                    "stock": 25,
                },
                "quantity": quantity,
            })
        })
        .collect();
    json!({ "id": 1, "items": items })
}

/// An order item owned by `vendor`.
#[must_use]
pub fn order_item_json(id: i64, vendor: i64, status: &str, subtotal: &str) -> Value {
    json!({
        "id": id,
        "product": id * 10,
        "product_name": format!("Item {id}"),
        "quantity": 1,
        "unit_price": subtotal,
        "subtotal": subtotal,
        "status": status,
        "vendor": vendor,
        "vendor_name": format!("Vendor {vendor}"),
        "order": { "uuid": ORDER_ID, "order_number": "ORD-1001" },
    })
}

/// The fixture order with the given status and items.
#[must_use]
pub fn order_json(status: &str, items: Vec<Value>) -> Value {
    json!({
        "uuid": ORDER_ID,
        "order_number": "ORD-1001",
        "status": status,
        "total_price": "1520.00",
        "items": items,
        "customer_email": "wanjiru@example.com",
        "created_at": "2026-03-14T09:30:00Z",
    })
}
