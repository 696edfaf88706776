//! Server-backed cart with client-local selection.
//!
//! The server owns cart contents. [`CartStore`] mirrors them, refetching
//! after every successful mutation, and layers the checkout selection on
//! top. Totals are always recomputed from the refetched cart and the current
//! selection.

mod store;

use std::fmt;

use agroshop_core::{CartItemId, ProductId};
use thiserror::Error;

pub use store::{CartSnapshot, CartStore};

use crate::error::ApiError;

/// Entity a cart command holds busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CartTarget {
    /// A cart line
    Item(CartItemId),
    /// A product being added
    Product(ProductId),
    /// The whole cart
    Cart,
}

impl fmt::Display for CartTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(id) => write!(f, "cart item {id}"),
            Self::Product(id) => write!(f, "product {id}"),
            Self::Cart => f.write_str("the cart"),
        }
    }
}

/// Cart command failure.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity below 1 where one is required.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// Requested quantity exceeds known stock.
    #[error("Only {available} in stock")]
    InsufficientStock {
        /// Units the product reports in stock.
        available: u32,
    },

    /// The item is not in the loaded cart.
    #[error("Item {0} is not in the cart")]
    UnknownItem(CartItemId),

    /// Another command is still running against the same entity.
    #[error("Another change to {0} is still in progress")]
    Busy(CartTarget),

    /// The mutation itself failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The mutation succeeded but the cart could not be reloaded.
    #[error("Cart changed but could not be reloaded: {0}")]
    RefreshFailed(ApiError),
}

impl CartError {
    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::RefreshFailed(_) => {
                "Your cart was updated but could not be reloaded. Pull to refresh.".to_string()
            }
            Self::Busy(_) => "Please wait for the previous change to finish.".to_string(),
            other => other.to_string(),
        }
    }

    /// The underlying API failure, if any.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) | Self::RefreshFailed(err) => Some(err),
            _ => None,
        }
    }
}
