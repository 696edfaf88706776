//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `AGROSHOP_API_BASE_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `AGROSHOP_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `AGROSHOP_CHECKOUT_REFRESH_DELAY_MS` - Delay before the post-checkout
//!   cart refresh (default: 1500)
//! - `AGROSHOP_STATUS_CHOICES_TTL_SECS` - Status choices cache TTL (default: 300)
//! - `AGROSHOP_STRICT_ITEM_TRANSITIONS` - Validate vendor status changes
//!   against the transition graph (default: false)
//! - `AGROSHOP_CURRENCY` - Display currency, `KES` or `USD` (default: KES)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use agroshop_core::{CurrencyCode, TransitionPolicy};
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// REST API configuration
    pub api: ApiConfig,
    /// Checkout behaviour
    pub checkout: CheckoutConfig,
    /// Order tracking behaviour
    pub orders: OrdersConfig,
    /// Display currency
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// REST API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; endpoint paths are joined onto it
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Checkout behaviour.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// Wait before refetching the cart after a successful initiation, so the
    /// provider's asynchronous cart changes have landed
    pub refresh_delay: Duration,
}

/// Order tracking behaviour.
#[derive(Debug, Clone, Copy)]
pub struct OrdersConfig {
    /// How long `/status-choices/` responses are cached
    pub status_choices_ttl: Duration,
    /// Client-side validation of vendor item-status changes
    pub transition_policy: TransitionPolicy,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_millis(DEFAULT_CHECKOUT_REFRESH_DELAY_MS),
        }
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            status_choices_ttl: Duration::from_secs(DEFAULT_STATUS_CHOICES_TTL_SECS),
            transition_policy: TransitionPolicy::Permissive,
        }
    }
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHECKOUT_REFRESH_DELAY_MS: u64 = 1500;
const DEFAULT_STATUS_CHOICES_TTL_SECS: u64 = 300;

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(&get_required_env("AGROSHOP_API_BASE_URL")?)?;
        let timeout = Duration::from_secs(get_parsed_env(
            "AGROSHOP_HTTP_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        let refresh_delay = Duration::from_millis(get_parsed_env(
            "AGROSHOP_CHECKOUT_REFRESH_DELAY_MS",
            DEFAULT_CHECKOUT_REFRESH_DELAY_MS,
        )?);
        let status_choices_ttl = Duration::from_secs(get_parsed_env(
            "AGROSHOP_STATUS_CHOICES_TTL_SECS",
            DEFAULT_STATUS_CHOICES_TTL_SECS,
        )?);
        let strict = get_parsed_env("AGROSHOP_STRICT_ITEM_TRANSITIONS", false)?;
        let currency = get_env_or_default("AGROSHOP_CURRENCY", "KES")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("AGROSHOP_CURRENCY".to_string(), e))?;

        Ok(Self {
            api: ApiConfig { base_url, timeout },
            checkout: CheckoutConfig { refresh_delay },
            orders: OrdersConfig {
                status_choices_ttl,
                transition_policy: if strict {
                    TransitionPolicy::Strict
                } else {
                    TransitionPolicy::Permissive
                },
            },
            currency,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for a given API base URL with every other setting at
    /// its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig {
                base_url: parse_base_url(base_url)?,
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            },
            checkout: CheckoutConfig::default(),
            orders: OrdersConfig::default(),
            currency: CurrencyCode::default(),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, making sure it ends with a slash so relative
/// endpoint paths join below it rather than replacing its last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized).map_err(|e| {
        ConfigError::InvalidEnvVar("AGROSHOP_API_BASE_URL".to_string(), e.to_string())
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "AGROSHOP_API_BASE_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable parsed into `T`, falling back to `default`
/// when unset.
fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("https://api.agroshop.example/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.agroshop.example/v1/");
        assert_eq!(
            url.join("cart/").unwrap().as_str(),
            "https://api.agroshop.example/v1/cart/"
        );
    }

    #[test]
    fn test_parse_base_url_keeps_trailing_slash() {
        let url = parse_base_url("http://localhost:8000/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_parse_base_url_rejects_relative() {
        let err = parse_base_url("not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_for_base_url_defaults() {
        let config = StorefrontConfig::for_base_url("http://localhost:8000").unwrap();
        assert_eq!(config.api.timeout, Duration::from_secs(30));
        assert_eq!(config.checkout.refresh_delay, Duration::from_millis(1500));
        assert_eq!(config.orders.status_choices_ttl, Duration::from_secs(300));
        assert_eq!(config.orders.transition_policy, TransitionPolicy::Permissive);
        assert_eq!(config.currency, CurrencyCode::KES);
    }

    #[test]
    fn test_get_parsed_env_default_when_unset() {
        let value: u64 = get_parsed_env("AGROSHOP_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }
}
