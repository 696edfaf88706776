//! `agroshop cart ...`

use agroshop_core::{CartItemId, CurrencyCode, ProductId};
use agroshop_storefront::Storefront;
use agroshop_storefront::cart::{CartError, CartSnapshot};
use tracing::info;

use super::money;

/// Log every line and the totals over the selected lines.
pub fn render(snapshot: &CartSnapshot, currency: CurrencyCode) {
    if snapshot.is_empty() {
        info!("Cart is empty");
        return;
    }

    for item in snapshot.items() {
        let mark = if snapshot.is_selected(item.id) { "x" } else { " " };
        info!(
            "[{mark}] #{id} {name} x{qty} @ {unit} = {line}",
            id = item.id,
            name = item.product.name,
            qty = item.quantity,
            unit = money(item.unit_price(), currency),
            line = money(item.line_total(), currency),
        );
    }

    let totals = snapshot.totals;
    info!(
        "{count} selected | subtotal {subtotal} | tax {tax} | shipping {shipping} | total {total}",
        count = totals.selected_count,
        subtotal = money(totals.subtotal, currency),
        tax = money(totals.tax, currency),
        shipping = if totals.ships_free() && totals.selected_count > 0 {
            "free".to_string()
        } else {
            money(totals.shipping, currency)
        },
        total = money(totals.total, currency),
    );
}

/// Fetch and show the cart.
///
/// # Errors
///
/// Returns the cart error if the fetch fails.
pub async fn show(storefront: &Storefront) -> Result<(), CartError> {
    let snapshot = storefront.cart().fetch().await?;
    render(&snapshot, storefront.config().currency);
    Ok(())
}

/// Add a product.
///
/// # Errors
///
/// Returns the cart error if the add fails.
pub async fn add(storefront: &Storefront, product: ProductId, quantity: u32) -> Result<(), CartError> {
    let snapshot = storefront.cart().add(product, quantity).await?;
    info!(product_id = %product, quantity, "Added to cart");
    render(&snapshot, storefront.config().currency);
    Ok(())
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns the cart error if the update fails.
pub async fn set(storefront: &Storefront, item: CartItemId, quantity: i64) -> Result<(), CartError> {
    let snapshot = storefront.cart().set_quantity(item, quantity).await?;
    render(&snapshot, storefront.config().currency);
    Ok(())
}

/// Raise or lower a line's quantity by one.
///
/// # Errors
///
/// Returns the cart error if the line is unknown or the update fails.
pub async fn step(storefront: &Storefront, item: CartItemId, delta: i8) -> Result<(), CartError> {
    let cart = storefront.cart();
    cart.fetch().await?;
    let snapshot = if delta > 0 {
        cart.increment(item).await?
    } else {
        cart.decrement(item).await?
    };
    render(&snapshot, storefront.config().currency);
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns the cart error if the removal fails.
pub async fn remove(storefront: &Storefront, item: CartItemId) -> Result<(), CartError> {
    let snapshot = storefront.cart().remove(item).await?;
    info!(item_id = %item, "Removed from cart");
    render(&snapshot, storefront.config().currency);
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns the cart error if the clear fails.
pub async fn clear(storefront: &Storefront) -> Result<(), CartError> {
    storefront.cart().clear().await?;
    info!("Cart cleared");
    Ok(())
}
