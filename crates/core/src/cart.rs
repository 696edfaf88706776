//! Cart, cart item, product and client-local selection types.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::id::{CartId, CartItemId, ProductId, UserId};
use crate::types::price::{deserialize_amount, parse_amount};

/// Read-only product reference as embedded in cart items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Unit price as sent by the server (string or number, kept verbatim).
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub price: String,
    /// Units available; `None` when the server does not report stock.
    #[serde(default)]
    pub stock: Option<u32>,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Owning vendor.
    #[serde(default)]
    pub vendor: Option<UserId>,
}

impl Product {
    /// Unit price, coerced leniently (unparsable prices are zero).
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        parse_amount(&self.price)
    }

    /// Whether `quantity` units can be ordered given the reported stock.
    #[must_use]
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock.is_none_or(|stock| quantity <= stock)
    }
}

/// A single line in the server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart item ID.
    pub id: CartItemId,
    /// Product in this line.
    pub product: Product,
    /// Quantity; the server never persists a value below 1.
    pub quantity: u32,
}

impl CartItem {
    /// Unit price of the product in this line.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.product.unit_price()
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        crate::pricing::line_amount(self.unit_price(), self.quantity)
    }
}

/// The authenticated customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Lines in server order.
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Look up a line by ID.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Client-local checkout selection, keyed by cart item.
///
/// The selection is never sent to the server. After every fetch it is
/// reconciled against the items actually present: keys for vanished items
/// are dropped, new items start selected, and existing choices are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    entries: BTreeMap<CartItemId, bool>,
}

impl Selection {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile against the item IDs of a freshly fetched cart.
    pub fn reconcile<I>(&mut self, present: I)
    where
        I: IntoIterator<Item = CartItemId>,
    {
        let mut next = BTreeMap::new();
        for id in present {
            let selected = self.entries.get(&id).copied().unwrap_or(true);
            next.insert(id, selected);
        }
        self.entries = next;
    }

    /// Whether an item is selected. Unknown items are not.
    #[must_use]
    pub fn is_selected(&self, id: CartItemId) -> bool {
        self.entries.get(&id).copied().unwrap_or(false)
    }

    /// Whether the selection has an entry for this item at all.
    #[must_use]
    pub fn contains(&self, id: CartItemId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Flip an item's flag. Returns the new value, or `None` for unknown items.
    pub fn toggle(&mut self, id: CartItemId) -> Option<bool> {
        self.entries.get_mut(&id).map(|selected| {
            *selected = !*selected;
            *selected
        })
    }

    /// Set an item's flag. Returns `false` for unknown items.
    pub fn set(&mut self, id: CartItemId, selected: bool) -> bool {
        self.entries.get_mut(&id).is_some_and(|flag| {
            *flag = selected;
            true
        })
    }

    /// Select or deselect every known item.
    pub fn set_all(&mut self, selected: bool) {
        for flag in self.entries.values_mut() {
            *flag = selected;
        }
    }

    /// Forget every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of selected items.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.entries.values().filter(|selected| **selected).count()
    }

    /// IDs of the selected items.
    pub fn selected_ids(&self) -> impl Iterator<Item = CartItemId> + '_ {
        self.entries
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(id, _)| *id)
    }

    /// All IDs with an entry, selected or not.
    pub fn keys(&self) -> impl Iterator<Item = CartItemId> + '_ {
        self.entries.keys().copied()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(raw: &[i64]) -> Vec<CartItemId> {
        raw.iter().copied().map(CartItemId::new).collect()
    }

    #[test]
    fn test_cart_deserializes_server_payload() {
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "id": 3,
            "items": [
                {
                    "id": 10,
                    "product": {
                        "id": 1,
                        "name": "Maize seed 2kg",
                        "price": "12.50",
                        "stock": 40,
                        "image": "https://cdn.example/maize.jpg",
                        "vendor": 5
                    },
                    "quantity": 2
                }
            ]
        }))
        .unwrap();

        assert_eq!(cart.id, CartId::new(3));
        let item = cart.item(CartItemId::new(10)).unwrap();
        assert_eq!(item.line_total(), Decimal::new(25, 0));
        assert_eq!(item.product.vendor, Some(UserId::new(5)));
        assert_eq!(cart.total_quantity(), 2);
    }

    #[test]
    fn test_product_tolerates_missing_fields() {
        let product: Product =
            serde_json::from_value(serde_json::json!({ "id": 9, "price": 4 })).unwrap();
        assert_eq!(product.unit_price(), Decimal::new(4, 0));
        assert!(product.stock.is_none());
        assert!(product.has_stock_for(1_000));
    }

    #[test]
    fn test_has_stock_for() {
        let product = Product {
            id: ProductId::new(1),
            name: "Hoe".to_string(),
            price: "300".to_string(),
            stock: Some(3),
            image: None,
            vendor: None,
        };
        assert!(product.has_stock_for(3));
        assert!(!product.has_stock_for(4));
    }

    #[test]
    fn test_reconcile_defaults_new_items_to_selected() {
        let mut selection = Selection::new();
        selection.reconcile(ids(&[1, 2]));
        assert!(selection.is_selected(CartItemId::new(1)));
        assert!(selection.is_selected(CartItemId::new(2)));
        assert_eq!(selection.selected_count(), 2);
    }

    #[test]
    fn test_reconcile_preserves_existing_choices() {
        let mut selection = Selection::new();
        selection.reconcile(ids(&[1, 2]));
        selection.set(CartItemId::new(1), false);

        selection.reconcile(ids(&[1, 2, 3]));
        assert!(!selection.is_selected(CartItemId::new(1)));
        assert!(selection.is_selected(CartItemId::new(2)));
        assert!(selection.is_selected(CartItemId::new(3)));
    }

    #[test]
    fn test_reconcile_prunes_absent_items() {
        let mut selection = Selection::new();
        selection.reconcile(ids(&[1, 2, 3]));
        selection.reconcile(ids(&[2]));
        assert_eq!(selection.keys().collect::<Vec<_>>(), ids(&[2]));
        assert!(!selection.contains(CartItemId::new(1)));
    }

    #[test]
    fn test_toggle_and_set_ignore_unknown_items() {
        let mut selection = Selection::new();
        selection.reconcile(ids(&[1]));
        assert_eq!(selection.toggle(CartItemId::new(1)), Some(false));
        assert_eq!(selection.toggle(CartItemId::new(1)), Some(true));
        assert_eq!(selection.toggle(CartItemId::new(99)), None);
        assert!(!selection.set(CartItemId::new(99), true));
        assert!(!selection.contains(CartItemId::new(99)));
    }

    #[test]
    fn test_line_total_overflow_is_zero() {
        let item = CartItem {
            id: CartItemId::new(1),
            product: Product {
                id: ProductId::new(1),
                name: String::new(),
                price: "9999999999999999999999999999".to_string(),
                stock: None,
                image: None,
                vendor: None,
            },
            quantity: 10,
        };
        assert_eq!(item.line_total(), Decimal::ZERO);

        let item = CartItem {
            quantity: 1,
            ..item
        };
        assert_eq!(item.line_total(), item.unit_price());
    }

    #[test]
    fn test_set_all_and_clear() {
        let mut selection = Selection::new();
        selection.reconcile(ids(&[1, 2]));
        selection.set_all(false);
        assert_eq!(selection.selected_count(), 0);
        assert_eq!(selection.len(), 2);
        selection.clear();
        assert!(selection.is_empty());
    }
}
