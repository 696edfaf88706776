//! Client state shared by every front-end screen.

use std::sync::Arc;

use agroshop_core::Identity;
use tokio::sync::broadcast;

use crate::api::{ApiClient, SessionEvent, TokenStore};
use crate::cart::CartStore;
use crate::checkout::CheckoutInitiator;
use crate::config::StorefrontConfig;
use crate::error::ApiError;
use crate::orders::OrderStatusTracker;

/// One signed-in session: the API client plus the cart and checkout built
/// on it.
///
/// This struct is cheaply cloneable via `Arc`. Order trackers are created
/// per identity with [`Storefront::orders`], since the role is decided
/// outside this crate.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    cart: CartStore,
    checkout: CheckoutInitiator,
}

impl Storefront {
    /// Build the client stack over the given token store.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api, tokens)?;
        let cart = CartStore::new(api.clone());
        let checkout = CheckoutInitiator::new(api.clone(), cart.clone(), config.checkout);

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                cart,
                checkout,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the checkout initiator.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutInitiator {
        &self.inner.checkout
    }

    /// Create an order tracker acting for `identity`.
    #[must_use]
    pub fn orders(&self, identity: Identity) -> OrderStatusTracker {
        OrderStatusTracker::new(self.inner.api.clone(), identity, &self.inner.config.orders)
    }

    /// Session notifications; [`SessionEvent::Expired`] means the user must
    /// log in again.
    #[must_use]
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.api.session().subscribe()
    }
}
