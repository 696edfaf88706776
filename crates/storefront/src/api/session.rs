//! Session tokens and the shared refresh coordinator.
//!
//! Token storage belongs to the host application and is reached through
//! [`TokenStore`]. [`SessionManager`] owns the refresh protocol: when any
//! request sees a 401, it asks the manager for a fresh token. Concurrent
//! callers queue on one lock, and whoever arrives after a successful
//! refresh gets the new token without issuing another refresh call.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::instrument;
use url::Url;

use super::response::read_body;
use crate::error::ApiError;

/// Token refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "api/token/refresh/";

/// Storage for the signed-in user's tokens.
///
/// Implementations must be cheap and non-blocking; they are called on every
/// request.
pub trait TokenStore: Send + Sync {
    /// Current access token, if signed in.
    fn access_token(&self) -> Option<SecretString>;

    /// Current refresh token, if any.
    fn refresh_token(&self) -> Option<SecretString>;

    /// Replace the access token after a refresh.
    fn set_access_token(&self, token: SecretString);

    /// Replace the refresh token when the server rotates it.
    fn set_refresh_token(&self, token: SecretString);

    /// Forget both tokens (logout).
    fn clear(&self);
}

#[derive(Default)]
struct Tokens {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

/// In-memory [`TokenStore`].
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Tokens>,
}

impl MemoryTokenStore {
    /// Create a store holding the given tokens.
    #[must_use]
    pub fn new(access: Option<SecretString>, refresh: Option<SecretString>) -> Self {
        Self {
            tokens: RwLock::new(Tokens { access, refresh }),
        }
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemoryTokenStore")
            .field("access", &tokens.access.as_ref().map(|_| "[REDACTED]"))
            .field("refresh", &tokens.refresh.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<SecretString> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access
            .clone()
    }

    fn refresh_token(&self) -> Option<SecretString> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh
            .clone()
    }

    fn set_access_token(&self, token: SecretString) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .access = Some(token);
    }

    fn set_refresh_token(&self, token: SecretString) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh = Some(token);
    }

    fn clear(&self) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.access = None;
        tokens.refresh = None;
    }
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new access token was obtained.
    Refreshed,
    /// The refresh failed and the tokens were cleared; the user must log in
    /// again.
    Expired,
}

/// Request body for the refresh endpoint.
#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Response from the refresh endpoint.
#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

/// Coordinates access-token use and refresh across all requests.
pub struct SessionManager {
    store: std::sync::Arc<dyn TokenStore>,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create a manager over the given token store.
    #[must_use]
    pub fn new(store: std::sync::Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// The access token to send.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotAuthenticated` if no token is stored.
    pub fn access_token(&self) -> Result<SecretString, ApiError> {
        self.store.access_token().ok_or(ApiError::NotAuthenticated)
    }

    /// Whether an access token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.access_token().is_some()
    }

    /// Subscribe to refresh and expiry notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Clear the tokens and announce the expiry.
    pub fn expire(&self) {
        self.store.clear();
        // No receivers is fine: nobody is listening for logout.
        let _ = self.events.send(SessionEvent::Expired);
    }

    /// Obtain a replacement for an access token the server just rejected.
    ///
    /// Only one refresh runs at a time. A caller that waited while another
    /// refresh succeeded receives the token that refresh stored.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` if there is no refresh token or the
    /// refresh call fails for any reason; the tokens are cleared and
    /// [`SessionEvent::Expired`] is broadcast in that case.
    #[instrument(skip_all)]
    pub async fn refresh_after(
        &self,
        client: &reqwest::Client,
        base_url: &Url,
        rejected: &SecretString,
    ) -> Result<SecretString, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        match self.store.access_token() {
            // Someone else already refreshed while we waited.
            Some(current) if current.expose_secret() != rejected.expose_secret() => {
                tracing::debug!("reusing access token refreshed by a concurrent request");
                return Ok(current);
            }
            // Someone else already failed and logged out while we waited.
            None => return Err(ApiError::SessionExpired),
            Some(_) => {}
        }

        let Some(refresh) = self.store.refresh_token() else {
            tracing::warn!("access token rejected and no refresh token available");
            self.expire();
            return Err(ApiError::SessionExpired);
        };

        match refresh_access_token(client, base_url, &refresh).await {
            Ok(response) => {
                let access = SecretString::from(response.access);
                self.store.set_access_token(access.clone());
                if let Some(rotated) = response.refresh {
                    self.store.set_refresh_token(SecretString::from(rotated));
                }
                let _ = self.events.send(SessionEvent::Refreshed);
                tracing::debug!("access token refreshed");
                Ok(access)
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, ending session");
                self.expire();
                Err(ApiError::SessionExpired)
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

/// Exchange a refresh token for a new access token.
async fn refresh_access_token(
    client: &reqwest::Client,
    base_url: &Url,
    refresh: &SecretString,
) -> Result<RefreshResponse, ApiError> {
    let url = base_url.join(REFRESH_PATH)?;

    let response = client
        .post(url)
        .json(&RefreshRequest {
            refresh: refresh.expose_secret(),
        })
        .send()
        .await?;

    let body = read_body(response).await?;
    Ok(serde_json::from_str(&body)?)
}
