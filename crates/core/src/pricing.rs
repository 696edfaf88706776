//! Derived cart totals.
//!
//! Totals are a pure function of the cart lines, the selection and a price
//! lookup. Nothing here is cached; callers recompute whenever the lines,
//! quantities or selection change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{CartItem, Selection};
use crate::order::OrderItem;
use crate::types::price::round2;

/// Sales tax applied to the selected subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Subtotals strictly above this ship free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Flat shipping fee below the threshold.
pub const FLAT_SHIPPING_FEE: Decimal = Decimal::from_parts(599, 0, 0, false, 2);

/// Totals for the selected part of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Σ unit price × quantity over selected lines.
    pub subtotal: Decimal,
    /// `subtotal × TAX_RATE`, unrounded.
    pub tax: Decimal,
    /// Zero above the free-shipping threshold or for an empty selection.
    pub shipping: Decimal,
    /// `round2(subtotal + tax + shipping)`.
    pub total: Decimal,
    /// Number of selected lines.
    pub selected_count: usize,
}

impl CartTotals {
    /// Whether shipping is waived.
    #[must_use]
    pub fn ships_free(&self) -> bool {
        self.shipping.is_zero()
    }
}

/// Compute totals for `items`, counting only lines for which `is_selected`
/// holds and pricing each through `price_of`.
#[must_use]
pub fn calculate<T, S, P, Q>(items: &[T], is_selected: S, price_of: P, quantity_of: Q) -> CartTotals
where
    S: Fn(&T) -> bool,
    P: Fn(&T) -> Decimal,
    Q: Fn(&T) -> u32,
{
    let (subtotal, selected_count) = items
        .iter()
        .filter(|item| is_selected(item))
        .fold((Decimal::ZERO, 0_usize), |(sum, count), item| {
            let line = line_amount(price_of(item), quantity_of(item));
            (add_or_skip(sum, line), count + 1)
        });

    let tax = subtotal.saturating_mul(TAX_RATE);
    let shipping = if selected_count == 0 || subtotal > FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING_FEE
    };

    CartTotals {
        subtotal,
        tax,
        shipping,
        total: round2(subtotal.saturating_add(tax).saturating_add(shipping)),
        selected_count,
    }
}

/// Totals for cart lines under a selection, priced by each line's product.
#[must_use]
pub fn cart_totals(items: &[CartItem], selection: &Selection) -> CartTotals {
    calculate(
        items,
        |item| selection.is_selected(item.id),
        CartItem::unit_price,
        |item| item.quantity,
    )
}

/// Sum of order-item subtotals, e.g. a vendor's revenue within one order.
#[must_use]
pub fn vendor_revenue(items: &[OrderItem]) -> Decimal {
    round2(
        items
            .iter()
            .map(OrderItem::subtotal_amount)
            .fold(Decimal::ZERO, add_or_skip),
    )
}

/// Unit price times quantity. A product too large to represent counts as
/// zero, like any other unusable amount.
#[must_use]
pub fn line_amount(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .unwrap_or(Decimal::ZERO)
}

/// Add `amount` to `sum`, dropping it if the sum would overflow.
fn add_or_skip(sum: Decimal, amount: Decimal) -> Decimal {
    sum.checked_add(amount).unwrap_or(sum)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::Product;
    use crate::types::id::{CartItemId, ProductId};
    use crate::types::price::parse_amount;

    fn item(id: i64, price: &str, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            product: Product {
                id: ProductId::new(id),
                name: format!("product {id}"),
                price: price.to_string(),
                stock: None,
                image: None,
                vendor: None,
            },
            quantity,
        }
    }

    fn all_selected(items: &[CartItem]) -> Selection {
        let mut selection = Selection::new();
        selection.reconcile(items.iter().map(|i| i.id));
        selection
    }

    #[test]
    fn test_constants() {
        assert_eq!(TAX_RATE.to_string(), "0.08");
        assert_eq!(FREE_SHIPPING_THRESHOLD.to_string(), "50");
        assert_eq!(FLAT_SHIPPING_FEE.to_string(), "5.99");
    }

    #[test]
    fn test_subtotal_counts_only_selected_lines() {
        let items = vec![item(1, "10.00", 2), item(2, "3.50", 4), item(3, "100", 1)];
        let mut selection = all_selected(&items);
        selection.set(CartItemId::new(3), false);

        let totals = cart_totals(&items, &selection);
        assert_eq!(totals.subtotal, Decimal::new(34, 0));
        assert_eq!(totals.selected_count, 2);
    }

    #[test]
    fn test_shipping_charged_below_threshold() {
        let items = vec![item(1, "20", 1)];
        let totals = cart_totals(&items, &all_selected(&items));
        assert_eq!(totals.shipping, FLAT_SHIPPING_FEE);
        // 20 + 1.60 + 5.99
        assert_eq!(totals.total, Decimal::new(2759, 2));
    }

    #[test]
    fn test_shipping_charged_at_exact_threshold() {
        let items = vec![item(1, "50", 1)];
        let totals = cart_totals(&items, &all_selected(&items));
        assert_eq!(totals.shipping, FLAT_SHIPPING_FEE);
    }

    #[test]
    fn test_shipping_free_above_threshold() {
        let items = vec![item(1, "25.01", 2)];
        let totals = cart_totals(&items, &all_selected(&items));
        assert!(totals.ships_free());
        // 50.02 + 4.0016 = 54.0216
        assert_eq!(totals.total, Decimal::new(5402, 2));
    }

    #[test]
    fn test_empty_selection_is_all_zero() {
        let items = vec![item(1, "20", 1)];
        let mut selection = all_selected(&items);
        selection.set_all(false);

        let totals = cart_totals(&items, &selection);
        assert_eq!(totals, CartTotals::default());
    }

    #[test]
    fn test_unparsable_price_counts_as_zero() {
        let items = vec![item(1, "call us", 3), item(2, "$12.00", 1)];
        let totals = cart_totals(&items, &all_selected(&items));
        assert_eq!(totals.subtotal, Decimal::new(12, 0));
        assert_eq!(totals.selected_count, 2);
    }

    #[test]
    fn test_total_is_rounded_sum_of_parts() {
        let items = vec![item(1, "0.35", 3), item(2, "1.11", 7)];
        let totals = cart_totals(&items, &all_selected(&items));
        assert_eq!(
            totals.total,
            round2(totals.subtotal + totals.subtotal * TAX_RATE + totals.shipping)
        );
        assert_eq!(totals.tax, totals.subtotal * TAX_RATE);
    }

    #[test]
    fn test_overflowing_line_counts_as_zero() {
        let items = vec![item(1, "9999999999999999999999999999", 10), item(2, "4.00", 1)];
        let totals = cart_totals(&items, &all_selected(&items));
        assert_eq!(totals.subtotal, Decimal::new(4, 0));
        assert_eq!(totals.selected_count, 2);
        assert_eq!(totals.shipping, FLAT_SHIPPING_FEE);
    }

    #[test]
    fn test_overflowing_sum_skips_line() {
        let huge = "40000000000000000000000000000";
        let items = vec![item(1, huge, 1), item(2, huge, 1)];
        let totals = cart_totals(&items, &all_selected(&items));
        assert_eq!(totals.subtotal, parse_amount(huge));
        assert!(totals.ships_free());
        assert!(totals.total >= totals.subtotal);
    }

    #[test]
    fn test_calculation_is_deterministic() {
        let items = vec![item(1, "9.99", 3), item(2, "0.01", 1)];
        let selection = all_selected(&items);
        assert_eq!(cart_totals(&items, &selection), cart_totals(&items, &selection));
    }

    #[test]
    fn test_subtotal_property_over_all_subsets() {
        let items = vec![
            item(1, "1.25", 1),
            item(2, "7.40", 2),
            item(3, "19.99", 3),
            item(4, "0.05", 9),
        ];

        for mask in 0_u32..16 {
            let mut selection = all_selected(&items);
            let mut expected = Decimal::ZERO;
            for (bit, line) in items.iter().enumerate() {
                let on = mask & (1 << bit) != 0;
                selection.set(line.id, on);
                if on {
                    expected += line.line_total();
                }
            }
            assert_eq!(cart_totals(&items, &selection).subtotal, expected, "mask {mask:04b}");
        }
    }

    #[test]
    fn test_generic_calculate_with_custom_price_lookup() {
        let lines = [("a", 2_u32), ("b", 1)];
        let totals = calculate(
            &lines,
            |_| true,
            |(name, _)| if *name == "a" { Decimal::new(30, 0) } else { Decimal::ZERO },
            |(_, qty)| *qty,
        );
        assert_eq!(totals.subtotal, Decimal::new(60, 0));
        assert!(totals.ships_free());
    }

    #[test]
    fn test_vendor_revenue() {
        let items: Vec<OrderItem> = serde_json::from_value(serde_json::json!([
            { "id": 1, "quantity": 1, "subtotal": "10.10", "status": "PAID" },
            { "id": 2, "quantity": 2, "subtotal": 5.45, "status": "SHIPPED" },
            { "id": 3, "quantity": 1, "subtotal": "bad", "status": "PAID" }
        ]))
        .unwrap();
        assert_eq!(vendor_revenue(&items), Decimal::new(1555, 2));
    }
}
