//! `agroshop vendor ...` and `agroshop status-choices`

use agroshop_core::{CurrencyCode, OrderId, OrderItemId, OrderStatus};
use agroshop_storefront::Storefront;
use agroshop_storefront::orders::{OrderError, OrderStatusTracker, TrackerView};
use tracing::info;

use super::money;

fn render(view: &TrackerView, currency: CurrencyCode) {
    if let Some(order) = &view.order {
        info!(
            "Order {number} ({uuid}) {status}",
            number = order.order_number,
            uuid = order.uuid,
            status = order.status.label(),
        );
    }
    if view.items().is_empty() {
        info!("No items");
        return;
    }
    for item in view.items() {
        let order = item
            .order
            .as_ref()
            .map(|o| format!(" in {}", o.order_number.as_deref().unwrap_or("order")))
            .unwrap_or_default();
        info!(
            "#{id} {name} x{qty} = {subtotal} [{status}]{order}",
            id = item.id,
            name = item.product_name,
            qty = item.quantity,
            subtotal = money(item.subtotal_amount(), currency),
            status = item.status.label(),
        );
    }
    info!("Revenue: {}", money(view.revenue(), currency));
}

/// List every item the vendor fulfils.
///
/// # Errors
///
/// Returns the order error if the request fails.
pub async fn items(storefront: &Storefront, tracker: &OrderStatusTracker) -> Result<(), OrderError> {
    let view = tracker.list_vendor_items().await?;
    render(&view, storefront.config().currency);
    Ok(())
}

/// Show the vendor's items in one order.
///
/// # Errors
///
/// Returns the order error if the request fails.
pub async fn order(
    storefront: &Storefront,
    tracker: &OrderStatusTracker,
    order_id: OrderId,
) -> Result<(), OrderError> {
    let view = tracker.fetch_order(order_id).await?;
    render(&view, storefront.config().currency);
    Ok(())
}

/// Change an item's status, loading the view it belongs to first.
///
/// # Errors
///
/// Returns the order error if the item is not the vendor's, the change is
/// refused, or a request fails.
pub async fn set_status(
    storefront: &Storefront,
    tracker: &OrderStatusTracker,
    item: OrderItemId,
    status: OrderStatus,
    order_id: Option<OrderId>,
) -> Result<(), OrderError> {
    match order_id {
        Some(order_id) => tracker.fetch_order(order_id).await?,
        None => tracker.list_vendor_items().await?,
    };
    let view = tracker.update_item_status(item, status).await?;
    info!(item_id = %item, status = status.label(), "Item status updated");
    render(&view, storefront.config().currency);
    Ok(())
}

/// List the statuses a vendor can choose from.
pub async fn status_choices(tracker: &OrderStatusTracker) {
    for choice in tracker.status_choices().await.iter() {
        info!("{} - {}", choice.value, choice.label);
    }
}
