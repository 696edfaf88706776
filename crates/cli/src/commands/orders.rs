//! `agroshop orders ...`

use agroshop_core::{CurrencyCode, Order, OrderId};
use agroshop_storefront::Storefront;
use agroshop_storefront::orders::{OrderError, OrderStatusTracker};
use tracing::info;

use super::money;

/// Log an order header and its lines.
pub fn render(order: &Order, currency: CurrencyCode) {
    info!(
        "Order {number} ({uuid}) {status} | {total} | placed {placed}",
        number = order.order_number,
        uuid = order.uuid,
        status = order.status.label(),
        total = money(order.total_amount(), currency),
        placed = order.created_at.format("%Y-%m-%d %H:%M"),
    );
    for item in &order.items {
        info!(
            "  #{id} {name} x{qty} = {subtotal} [{status}]{vendor}",
            id = item.id,
            name = item.product_name,
            qty = item.quantity,
            subtotal = money(item.subtotal_amount(), currency),
            status = item.status.label(),
            vendor = item
                .vendor_name
                .as_deref()
                .map(|v| format!(" sold by {v}"))
                .unwrap_or_default(),
        );
    }
}

/// List the customer's orders.
///
/// # Errors
///
/// Returns the order error if the request fails.
pub async fn list(storefront: &Storefront, tracker: &OrderStatusTracker) -> Result<(), OrderError> {
    let orders = tracker.list_orders().await?;
    if orders.is_empty() {
        info!("No orders yet");
    }
    for order in &orders {
        info!(
            "{number} ({uuid}) {status} {total}",
            number = order.order_number,
            uuid = order.uuid,
            status = order.status.label(),
            total = money(order.total_amount(), storefront.config().currency),
        );
    }
    Ok(())
}

/// Show one order.
///
/// # Errors
///
/// Returns the order error if the request fails.
pub async fn show(
    storefront: &Storefront,
    tracker: &OrderStatusTracker,
    order_id: OrderId,
) -> Result<(), OrderError> {
    let view = tracker.fetch_order(order_id).await?;
    if let Some(order) = &view.order {
        render(order, storefront.config().currency);
        if order.can_cancel() {
            info!("This order can still be cancelled");
        }
    }
    Ok(())
}

/// Cancel an order after loading it.
///
/// # Errors
///
/// Returns the order error if the order cannot be cancelled or the request
/// fails.
pub async fn cancel(
    storefront: &Storefront,
    tracker: &OrderStatusTracker,
    order_id: OrderId,
    reason: Option<&str>,
) -> Result<(), OrderError> {
    tracker.fetch_order(order_id).await?;
    let view = tracker.cancel(reason).await?;
    info!("Order cancelled");
    if let Some(order) = &view.order {
        render(order, storefront.config().currency);
    }
    Ok(())
}
