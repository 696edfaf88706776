//! Orders, order items and checkout requests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::id::{CartId, OrderId, OrderItemId, ProductId, UserId};
use crate::types::phone::PhoneNumber;
use crate::types::price::{deserialize_amount, parse_amount};
use crate::types::status::OrderStatus;

/// Order summary embedded in vendor order-item listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    /// Order UUID.
    pub uuid: OrderId,
    /// Human-facing order number.
    #[serde(default)]
    pub order_number: Option<String>,
    /// Customer email.
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Customer phone number.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// When the order was placed.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A single product line in an order, owned by one vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Order item ID.
    pub id: OrderItemId,
    /// Product reference.
    #[serde(default)]
    pub product: Option<ProductId>,
    /// Product name at the time of purchase.
    #[serde(default)]
    pub product_name: String,
    /// Product image URL.
    #[serde(default)]
    pub product_image: Option<String>,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price (raw server representation).
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub unit_price: String,
    /// Line subtotal (raw server representation).
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub subtotal: String,
    /// Fulfillment status of this line.
    pub status: OrderStatus,
    /// Owning vendor.
    #[serde(default)]
    pub vendor: Option<UserId>,
    /// Vendor display name.
    #[serde(default)]
    pub vendor_name: Option<String>,
    /// Parent order, present in vendor listings.
    #[serde(default)]
    pub order: Option<OrderRef>,
}

impl OrderItem {
    /// Line subtotal as a decimal (unparsable values are zero).
    #[must_use]
    pub fn subtotal_amount(&self) -> Decimal {
        parse_amount(&self.subtotal)
    }

    /// Unit price as a decimal (unparsable values are zero).
    #[must_use]
    pub fn unit_price_amount(&self) -> Decimal {
        parse_amount(&self.unit_price)
    }

    /// Whether this line belongs to `vendor`.
    #[must_use]
    pub fn is_owned_by(&self, vendor: UserId) -> bool {
        self.vendor == Some(vendor)
    }
}

/// Persisted post-checkout aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order UUID.
    pub uuid: OrderId,
    /// Human-facing order number.
    #[serde(default)]
    pub order_number: String,
    /// Overall order status.
    pub status: OrderStatus,
    /// Order total (raw server representation).
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub total_price: String,
    /// Number of units in the order, as reported by the server.
    #[serde(default)]
    pub total_items: Option<u32>,
    /// Lines in this order.
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Customer email.
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Contact phone number.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Delivery address.
    #[serde(default)]
    pub delivery_address: Option<String>,
    /// Free-form customer notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Order total as a decimal (unparsable values are zero).
    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        parse_amount(&self.total_price)
    }

    /// Look up a line by ID.
    #[must_use]
    pub fn item(&self, id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Whether a customer may still cancel this order.
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Copy of this order keeping only the lines owned by `vendor`.
    #[must_use]
    pub fn for_vendor(&self, vendor: UserId) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|item| item.is_owned_by(vendor))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }
}

/// A payment initiation handed to the mobile-money provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Cart being paid for.
    pub cart_id: CartId,
    /// Phone that receives the payment prompt.
    pub phone: PhoneNumber,
    /// Provider-issued request ID, once initiation succeeded.
    pub checkout_request_id: Option<String>,
    /// Outcome of the initiation.
    pub outcome: CheckoutOutcome,
}

/// Result of a payment initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// The initiation call has not resolved yet.
    Pending,
    /// The provider accepted the request.
    Initiated,
    /// The initiation failed with a user-visible reason.
    Failed(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        serde_json::from_value(serde_json::json!({
            "uuid": "6f1c2a3e-7b4d-4c1a-9e2f-0a1b2c3d4e5f",
            "order_number": "ORD-1001",
            "status": "PAID",
            "total_price": "1520.00",
            "total_items": 3,
            "items": [
                {
                    "id": 1,
                    "product": 11,
                    "product_name": "Maize seed 2kg",
                    "quantity": 2,
                    "unit_price": "500.00",
                    "subtotal": "1000.00",
                    "status": "PAID",
                    "vendor": 7,
                    "vendor_name": "Green Acres"
                },
                {
                    "id": 2,
                    "product": 12,
                    "product_name": "Fertilizer 5kg",
                    "quantity": 1,
                    "unit_price": 520,
                    "subtotal": 520,
                    "status": "PROCESSING",
                    "vendor": 8
                }
            ],
            "phone_number": "254712345678",
            "delivery_address": "Nakuru",
            "created_at": "2025-03-01T10:15:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_order_deserializes() {
        let order = sample_order();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total_amount(), Decimal::new(1520, 0));
        assert_eq!(order.items.len(), 2);
        assert_eq!(
            order.item(OrderItemId::new(2)).unwrap().subtotal_amount(),
            Decimal::new(520, 0)
        );
        assert!(order.can_cancel());
    }

    #[test]
    fn test_for_vendor_filters_items() {
        let order = sample_order();
        let vendor_view = order.for_vendor(UserId::new(7));
        assert_eq!(vendor_view.items.len(), 1);
        assert_eq!(vendor_view.items[0].id, OrderItemId::new(1));
        assert_eq!(vendor_view.uuid, order.uuid);

        assert!(order.for_vendor(UserId::new(99)).items.is_empty());
    }

    #[test]
    fn test_checkout_outcome_serialization() {
        let json = serde_json::to_value(CheckoutOutcome::Failed("declined".to_string())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "outcome": "failed", "detail": "declined" })
        );
    }
}
