//! Unified error handling with Sentry integration.
//!
//! [`ApiError`] classifies every failed remote call. Domain errors
//! ([`CartError`], [`CheckoutError`], [`OrderError`]) wrap it, and
//! [`StorefrontError`] unifies them for front ends. Every variant converts
//! to a user-visible message through `user_message()`.

use std::collections::BTreeMap;

use thiserror::Error;

pub use crate::cart::CartError;
pub use crate::checkout::CheckoutError;
pub use crate::orders::OrderError;

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response: connection refused, DNS failure, timeout.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No access token is available.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// 401 persisted after a token refresh, or the refresh itself failed.
    #[error("Session expired")]
    SessionExpired,

    /// 403.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// 400, with the server's messages.
    #[error("Validation failed: {message}")]
    Validation {
        /// Combined message, suitable for display as-is.
        message: String,
        /// Field-level messages keyed by field name.
        fields: BTreeMap<String, Vec<String>>,
    },

    /// 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// 429.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// 5xx.
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// Any other non-success status.
    #[error("Unexpected response (HTTP {status}): {message}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network error. Check your connection and try again.".to_string(),
            Self::NotAuthenticated => "Please log in to continue.".to_string(),
            Self::SessionExpired => "Session expired. Please log in again.".to_string(),
            Self::Permission(msg) if !msg.is_empty() => msg.clone(),
            Self::Permission(_) => "You do not have permission to perform this action.".to_string(),
            Self::Validation { message, .. } => message.clone(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::RateLimited(secs) => format!("Too many requests. Try again in {secs} seconds."),
            Self::Server { .. } => "Something went wrong on our side. Please try again.".to_string(),
            Self::Unexpected { .. } | Self::Parse(_) | Self::InvalidUrl(_) => {
                "Unexpected response from the server.".to_string()
            }
        }
    }

    /// Whether the user may reasonably retry the same command.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server { .. } | Self::RateLimited(_)
        )
    }

    /// Whether the caller should treat the session as ended.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::SessionExpired)
    }

    /// Field-level messages for a validation failure.
    #[must_use]
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Whether this failure is on the server or transport side, and thus
    /// worth reporting.
    const fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Server { .. }
                | Self::Unexpected { .. }
                | Self::Parse(_)
                | Self::InvalidUrl(_)
        )
    }
}

/// Any error surfaced by the storefront client.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Cart command failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout command failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order command failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Remote call failed outside a domain command.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl StorefrontError {
    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Cart(err) => err.user_message(),
            Self::Checkout(err) => err.user_message(),
            Self::Order(err) => err.user_message(),
            Self::Api(err) => err.user_message(),
            Self::Config(err) => err.to_string(),
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Log an API failure and, for server or transport failures, report it to
/// Sentry. Reporting is a no-op when Sentry is not initialized.
pub fn capture(err: &ApiError) {
    if err.is_reportable() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            sentry_event_id = %event_id,
            "Storefront API error"
        );
    } else {
        tracing::warn!(error = %err, "Storefront API request rejected");
    }
}

/// Add a breadcrumb for a user command.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of commands
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
