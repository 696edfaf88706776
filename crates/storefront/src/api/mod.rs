//! REST API transport.
//!
//! [`ApiClient`] joins endpoint paths onto the configured base URL, attaches
//! the bearer token, maps failures to [`ApiError`] and, on a 401, refreshes
//! the token through the shared [`SessionManager`] and retries exactly once.

pub mod session;

pub(crate) mod response;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

pub use session::{MemoryTokenStore, SessionEvent, SessionManager, TokenStore};

pub(crate) use response::ListPayload;

use crate::config::ApiConfig;
use crate::error::ApiError;

/// Endpoint paths, relative to the API base URL.
pub mod paths {
    use agroshop_core::{CartItemId, OrderId, OrderItemId};

    /// Current user's cart.
    pub const CART: &str = "cart/";
    /// Add a product to the cart.
    pub const CART_ADD: &str = "cart/add/";
    /// Empty the cart.
    pub const CART_CLEAR: &str = "clear/";
    /// Start mobile-money checkout.
    pub const CHECKOUT_INITIATE: &str = "initiate/";
    /// Customer order list.
    pub const ORDERS: &str = "orders/";
    /// Vendor's order items.
    pub const VENDOR_ORDER_ITEMS: &str = "vendor/order-items/";
    /// Status values and labels.
    pub const STATUS_CHOICES: &str = "status-choices/";

    /// A cart line.
    #[must_use]
    pub fn cart_item(id: CartItemId) -> String {
        format!("item/{id}/")
    }

    /// A single order.
    #[must_use]
    pub fn order(id: OrderId) -> String {
        format!("orders/{id}/")
    }

    /// Cancel an order.
    #[must_use]
    pub fn order_cancel(id: OrderId) -> String {
        format!("orders/{id}/cancel/")
    }

    /// Update a vendor's order item status.
    #[must_use]
    pub fn vendor_item_status(id: OrderItemId) -> String {
        format!("vendor/order-items/{id}/status/")
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Authenticated client for the storefront REST API.
///
/// Cheap to clone; clones share the connection pool and session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: SessionManager,
}

impl ApiClient {
    /// Create a client over the given token store.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                session: SessionManager::new(tokens),
            }),
        })
    }

    /// The session shared by every request from this client.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// The base URL endpoint paths are joined onto.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// GET a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` for any failed call.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.execute(Method::GET, path, None).await?;
        response::decode(&body)
    }

    /// GET a JSON resource, mapping 404 to `None`.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` for any failure other than 404.
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        match self.get(path).await {
            Ok(value) => Ok(Some(value)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` for any failed call.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }

    /// PUT a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` for any failed call.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body).await
    }

    /// PATCH a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` for any failed call.
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, body).await
    }

    /// DELETE, optionally with a JSON body. The response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` for any failed call.
    pub async fn delete<B>(&self, path: &str, body: Option<&B>) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let json = body.map(serde_json::to_value).transpose()?;
        self.execute(Method::DELETE, path, json.as_ref()).await?;
        Ok(())
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let json = serde_json::to_value(body)?;
        let body = self.execute(method, path, Some(&json)).await?;
        response::decode(&body)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Send a request and return the raw success body.
    ///
    /// A 401 triggers one token refresh and one retry. A second 401 is
    /// returned as `ApiError::SessionExpired`.
    #[instrument(skip(self, method, body), fields(method = %method))]
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String, ApiError> {
        let url = self.inner.base_url.join(path.trim_start_matches('/'))?;
        let token = self.inner.session.access_token()?;

        let response = self.dispatch(&method, &url, body, &token).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            debug!("access token rejected, refreshing");
            let fresh = self
                .inner
                .session
                .refresh_after(&self.inner.client, &self.inner.base_url, &token)
                .await?;
            let retried = self.dispatch(&method, &url, body, &fresh).await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(ApiError::SessionExpired);
            }
            retried
        } else {
            response
        };

        response::read_body(response).await
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        token: &SecretString,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self
            .inner
            .client
            .request(method.clone(), url.clone())
            .bearer_auth(token.expose_secret())
            .header("Accept", "application/json");

        if let Some(json) = body {
            request = request.json(json);
        }

        Ok(request.send().await?)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use agroshop_core::{CartItemId, OrderId, OrderItemId};

    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            base_url: Url::parse("http://localhost:8000/api/").unwrap(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_paths() {
        assert_eq!(paths::cart_item(CartItemId::new(7)), "item/7/");
        assert_eq!(
            paths::vendor_item_status(OrderItemId::new(42)),
            "vendor/order-items/42/status/"
        );
        let id: OrderId = "6f1c1e7e-8a31-4f3e-9d55-1f6a4cf1b0a2".parse().unwrap();
        assert_eq!(
            paths::order_cancel(id),
            "orders/6f1c1e7e-8a31-4f3e-9d55-1f6a4cf1b0a2/cancel/"
        );
    }

    #[test]
    fn test_paths_join_below_base() {
        let client = ApiClient::new(&config(), Arc::new(MemoryTokenStore::default())).unwrap();
        let url = client.base_url().join(paths::CART_ADD).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/cart/add/");
    }

    #[tokio::test]
    async fn test_request_without_token_is_not_authenticated() {
        let client = ApiClient::new(&config(), Arc::new(MemoryTokenStore::default())).unwrap();
        let result: Result<serde_json::Value, _> = client.get(paths::CART).await;
        assert!(matches!(result, Err(ApiError::NotAuthenticated)));
    }
}
