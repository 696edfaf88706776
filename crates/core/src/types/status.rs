//! Status enums and caller roles.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Lifecycle status shared by orders and order items.
///
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in fulfillment order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire representation (`"PENDING"`, `"PAID"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Human-readable label (`"Processing"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// No transition leaves a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether a customer may cancel an order in this status.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    /// Position along the fulfillment path; `None` for `Cancelled`.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Paid => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Whether `next` is a legal successor under the validated transition graph.
    ///
    /// Items move forward along `PENDING → PAID → PROCESSING → SHIPPED →
    /// DELIVERED` (skipping steps is allowed) and may be cancelled until they
    /// ship.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            (Some(from), None) => from < 3,
            _ => false,
        }
    }

    /// Statuses reachable from this one in a single validated step.
    #[must_use]
    pub fn allowed_next(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// How vendor item-status updates are checked before they are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionPolicy {
    /// Any of the six statuses may be sent; the server decides.
    #[default]
    Permissive,
    /// Only transitions allowed by [`OrderStatus::can_transition_to`].
    Strict,
}

impl TransitionPolicy {
    /// Whether the policy lets `from` move to `to`.
    #[must_use]
    pub const fn permits(self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            Self::Permissive => true,
            Self::Strict => from.can_transition_to(to),
        }
    }
}

/// Role of the signed-in user, determined outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shopper who owns carts and orders.
    Customer,
    /// Seller who fulfills the order items for their own products.
    Vendor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// The signed-in user as seen by the order tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// User ID; for vendors this is the owner ID carried on order items.
    pub user_id: UserId,
    /// Current role.
    pub role: Role,
}

impl Identity {
    /// Create a customer identity.
    #[must_use]
    pub const fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    /// Create a vendor identity.
    #[must_use]
    pub const fn vendor(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Vendor,
        }
    }
}
