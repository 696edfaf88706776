//! Role-scoped order tracking.
//!
//! Customers view and cancel their own orders. Vendors list the order items
//! they fulfil, or view one order filtered to their items, and move those
//! items through the status lifecycle one at a time.

mod choices;
mod tracker;

use agroshop_core::{OrderId, OrderItemId, OrderStatus, Role};
use thiserror::Error;

pub use choices::StatusChoice;
pub use tracker::{OrderStatusTracker, TrackerView, ViewScope};

use crate::error::ApiError;

/// Order command failure.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The command belongs to the other role.
    #[error("This action requires the {required} role (current role: {actual})")]
    WrongRole {
        /// Role the command needs.
        required: Role,
        /// Role of the signed-in user.
        actual: Role,
    },

    /// No order is loaded to act on.
    #[error("No order is loaded")]
    NoOrderLoaded,

    /// Cancellation is only allowed while pending or paid.
    #[error("Only pending or paid orders can be cancelled (status: {})", .status.label())]
    NotCancellable {
        /// Status at the time of the attempt.
        status: OrderStatus,
    },

    /// The item is not among the vendor's items in the current view.
    #[error("Order item {0} is not one of your items")]
    NotOwner(OrderItemId),

    /// The transition policy forbids this status change.
    #[error("Cannot move an item from {from} to {to}")]
    InvalidTransition {
        /// Current item status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// A status update for this item is still in flight.
    #[error("Order item {0} is already being updated")]
    ItemBusy(OrderItemId),

    /// A cancellation for this order is still in flight.
    #[error("Order {0} is already being cancelled")]
    CancelInProgress(OrderId),

    /// The remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl OrderError {
    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_cancellable_message() {
        let err = OrderError::NotCancellable {
            status: OrderStatus::Shipped,
        };
        assert_eq!(
            err.user_message(),
            "Only pending or paid orders can be cancelled (status: Shipped)"
        );
    }

    #[test]
    fn test_wrong_role_message() {
        let err = OrderError::WrongRole {
            required: Role::Vendor,
            actual: Role::Customer,
        };
        assert_eq!(
            err.to_string(),
            "This action requires the vendor role (current role: customer)"
        );
    }
}
