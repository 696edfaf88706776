//! CLI command implementations.
//!
//! Results are reported through `tracing` at info level.

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod vendor;

use agroshop_core::{CurrencyCode, Identity, Price, UserId};
use agroshop_storefront::config::ConfigError;
use rust_decimal::Decimal;

/// Format an amount in the configured currency.
pub fn money(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}

/// Customer identity for the given user.
pub fn customer(user_id: Option<UserId>) -> Result<Identity, ConfigError> {
    require_user(user_id).map(Identity::customer)
}

/// Vendor identity for the given user.
pub fn vendor(user_id: Option<UserId>) -> Result<Identity, ConfigError> {
    require_user(user_id).map(Identity::vendor)
}

fn require_user(user_id: Option<UserId>) -> Result<UserId, ConfigError> {
    user_id.ok_or_else(|| ConfigError::MissingEnvVar("AGROSHOP_USER_ID".to_string()))
}
