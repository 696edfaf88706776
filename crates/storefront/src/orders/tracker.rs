//! `OrderStatusTracker` - customer and vendor order views.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use agroshop_core::pricing;
use agroshop_core::{
    Identity, Order, OrderId, OrderItem, OrderItemId, OrderStatus, Role, TransitionPolicy,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::IgnoredAny;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use super::OrderError;
use super::choices::{ChoicesCache, StatusChoice};
use crate::api::{ApiClient, ListPayload, paths};
use crate::config::OrdersConfig;
use crate::error::{ApiError, add_breadcrumb, capture};
use crate::inflight::{InFlight, Operation};

/// What the tracker's current view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    /// One order; for vendors, filtered to their own items.
    Order(OrderId),
    /// Every order item owned by the vendor, across orders.
    VendorItems,
}

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerView {
    /// What `order` / `vendor_items` currently show.
    pub scope: Option<ViewScope>,
    /// The loaded order, in `ViewScope::Order`.
    pub order: Option<Order>,
    /// The vendor's items, in `ViewScope::VendorItems`.
    pub vendor_items: Vec<OrderItem>,
    /// The customer's order list, from the last `list_orders`.
    pub orders: Vec<Order>,
    applied_ticket: u64,
}

impl TrackerView {
    /// Items in the current scope.
    #[must_use]
    pub fn items(&self) -> &[OrderItem] {
        match self.scope {
            Some(ViewScope::Order(_)) => self.order.as_ref().map_or(&[], |o| o.items.as_slice()),
            Some(ViewScope::VendorItems) => &self.vendor_items,
            None => &[],
        }
    }

    /// An item in the current scope.
    #[must_use]
    pub fn item(&self, id: OrderItemId) -> Option<&OrderItem> {
        self.items().iter().find(|item| item.id == id)
    }

    /// Sum of item subtotals in the current scope.
    #[must_use]
    pub fn revenue(&self) -> Decimal {
        pricing::vendor_revenue(self.items())
    }
}

#[derive(Serialize)]
struct CancelRequest<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
struct StatusUpdateRequest {
    status: OrderStatus,
}

/// Order views and commands for one signed-in user.
///
/// The identity and role come from outside; the tracker only enforces
/// which commands each role may issue. Cheap to clone.
#[derive(Clone)]
pub struct OrderStatusTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    api: ApiClient,
    identity: Identity,
    policy: TransitionPolicy,
    view: watch::Sender<Arc<TrackerView>>,
    updating: InFlight<OrderItemId>,
    cancelling: InFlight<OrderId>,
    choices: ChoicesCache,
    /// Last scoped-load ticket issued; older responses are dropped.
    tickets: AtomicU64,
}

impl OrderStatusTracker {
    /// Create a tracker for `identity`.
    #[must_use]
    pub fn new(api: ApiClient, identity: Identity, config: &OrdersConfig) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                api,
                identity,
                policy: config.transition_policy,
                view: watch::Sender::new(Arc::new(TrackerView::default())),
                updating: InFlight::default(),
                cancelling: InFlight::default(),
                choices: ChoicesCache::new(config.status_choices_ttl),
                tickets: AtomicU64::new(0),
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// The signed-in user this tracker acts for.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.inner.identity
    }

    /// Current view.
    #[must_use]
    pub fn view(&self) -> Arc<TrackerView> {
        self.inner.view.borrow().clone()
    }

    /// Watch the view change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<TrackerView>> {
        self.inner.view.subscribe()
    }

    /// Whether a status update for `item_id` is in flight.
    #[must_use]
    pub fn is_updating(&self, item_id: OrderItemId) -> bool {
        self.inner.updating.is_busy(&item_id)
    }

    /// Watch the set of items with an update in flight.
    #[must_use]
    pub fn subscribe_updating(&self) -> watch::Receiver<BTreeMap<OrderItemId, Operation>> {
        self.inner.updating.subscribe()
    }

    /// Revenue over the items in the current view.
    #[must_use]
    pub fn vendor_revenue(&self) -> Decimal {
        self.view().revenue()
    }

    /// Statuses a vendor can choose from, cached for the configured TTL.
    pub async fn status_choices(&self) -> Arc<Vec<StatusChoice>> {
        self.inner.choices.get(&self.inner.api).await
    }

    /// Drop cached status choices so the next call refetches them.
    pub async fn invalidate_status_choices(&self) {
        self.inner.choices.invalidate().await;
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// List the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::WrongRole` for vendors, or the request failure.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        self.require(Role::Customer)?;

        let orders = self
            .inner
            .api
            .get::<ListPayload<Order>>(paths::ORDERS)
            .await
            .map_err(Self::reject)?
            .into_vec();

        self.inner.view.send_modify(|view| {
            Arc::make_mut(view).orders.clone_from(&orders);
        });
        debug!(count = orders.len(), "customer orders loaded");
        Ok(orders)
    }

    /// Load one order into the view. Vendors see only their own items.
    ///
    /// # Errors
    ///
    /// Returns the request failure (404 as `ApiError::NotFound`, 403 as
    /// `ApiError::Permission`); the previous view is kept.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Arc<TrackerView>, OrderError> {
        let ticket = self.next_ticket();

        let order = self
            .inner
            .api
            .get::<Order>(&paths::order(order_id))
            .await
            .map_err(Self::reject)?;

        let order = match self.inner.identity.role {
            Role::Customer => order,
            Role::Vendor => order.for_vendor(self.inner.identity.user_id),
        };

        Ok(self.apply(ticket, |view| {
            view.scope = Some(ViewScope::Order(order_id));
            view.order = Some(order);
            view.vendor_items.clear();
        }))
    }

    /// Load every order item the vendor owns.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::WrongRole` for customers, or the request failure.
    #[instrument(skip(self))]
    pub async fn list_vendor_items(&self) -> Result<Arc<TrackerView>, OrderError> {
        self.require(Role::Vendor)?;
        let ticket = self.next_ticket();

        let items = self
            .inner
            .api
            .get::<ListPayload<OrderItem>>(paths::VENDOR_ORDER_ITEMS)
            .await
            .map_err(Self::reject)?
            .into_vec();

        Ok(self.apply(ticket, |view| {
            view.scope = Some(ViewScope::VendorItems);
            view.order = None;
            view.vendor_items = items;
        }))
    }

    /// Reload whatever the view currently shows.
    ///
    /// # Errors
    ///
    /// Returns the request failure; an empty view is left as is.
    pub async fn refresh(&self) -> Result<Arc<TrackerView>, OrderError> {
        match self.view().scope {
            Some(ViewScope::Order(order_id)) => self.fetch_order(order_id).await,
            Some(ViewScope::VendorItems) => self.list_vendor_items().await,
            None => Ok(self.view()),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Cancel the loaded order, then reload it.
    ///
    /// Only `PENDING` and `PAID` orders can be cancelled; any other status is
    /// rejected before a request is made and the view is left unchanged.
    ///
    /// # Errors
    ///
    /// - `OrderError::WrongRole` for vendors
    /// - `OrderError::NoOrderLoaded` without a loaded order
    /// - `OrderError::NotCancellable` for other statuses
    /// - `OrderError::CancelInProgress` while a cancel is in flight
    /// - `OrderError::Api` if the server rejects the cancel
    #[instrument(skip(self, reason))]
    pub async fn cancel(&self, reason: Option<&str>) -> Result<Arc<TrackerView>, OrderError> {
        self.require(Role::Customer)?;

        let (order_id, status) = {
            let view = self.inner.view.borrow();
            let order = view.order.as_ref().ok_or(OrderError::NoOrderLoaded)?;
            (order.uuid, order.status)
        };

        if !status.is_cancellable() {
            warn!(%order_id, %status, "cancel rejected for order status");
            return Err(OrderError::NotCancellable { status });
        }

        let Some(_guard) = self.inner.cancelling.try_begin(order_id, Operation::Cancel) else {
            warn!(%order_id, "cancel already in progress");
            return Err(OrderError::CancelInProgress(order_id));
        };

        let order_label = order_id.to_string();
        add_breadcrumb(
            "orders",
            "Cancelling order",
            Some(&[("order_id", order_label.as_str())]),
        );

        self.inner
            .api
            .post::<_, IgnoredAny>(
                &paths::order_cancel(order_id),
                &CancelRequest {
                    reason: reason.unwrap_or_default(),
                },
            )
            .await
            .map_err(Self::reject)?;

        debug!(%order_id, "order cancelled");
        self.fetch_order(order_id).await
    }

    /// Send a new status for one of the vendor's items, then reload the view.
    ///
    /// The item is flagged as updating until the request resolves. Under
    /// `TransitionPolicy::Strict` the change is checked against the status
    /// graph first.
    ///
    /// # Errors
    ///
    /// - `OrderError::WrongRole` for customers
    /// - `OrderError::NotOwner` if the item is not the vendor's item in the
    ///   current view
    /// - `OrderError::InvalidTransition` if the policy forbids the change
    /// - `OrderError::ItemBusy` while the item is already being updated
    /// - `OrderError::Api` if the server rejects the update
    #[instrument(skip(self), fields(item_id = %item_id, status = %status))]
    pub async fn update_item_status(
        &self,
        item_id: OrderItemId,
        status: OrderStatus,
    ) -> Result<Arc<TrackerView>, OrderError> {
        self.require(Role::Vendor)?;
        let vendor = self.inner.identity.user_id;

        let current = {
            let view = self.inner.view.borrow();
            view.item(item_id)
                .filter(|item| item.vendor.is_none_or(|owner| owner == vendor))
                .map(|item| item.status)
        };
        let Some(current) = current else {
            warn!("status update rejected: item not owned by vendor in current view");
            return Err(OrderError::NotOwner(item_id));
        };

        if !self.inner.policy.permits(current, status) {
            warn!(from = %current, "status update rejected by transition policy");
            return Err(OrderError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let Some(guard) = self
            .inner
            .updating
            .try_begin(item_id, Operation::UpdateStatus)
        else {
            warn!("status update already in flight");
            return Err(OrderError::ItemBusy(item_id));
        };

        let item_label = item_id.to_string();
        add_breadcrumb(
            "orders",
            "Updating item status",
            Some(&[("item_id", item_label.as_str()), ("status", status.as_str())]),
        );

        self.inner
            .api
            .patch::<_, IgnoredAny>(
                &paths::vendor_item_status(item_id),
                &StatusUpdateRequest { status },
            )
            .await
            .map_err(Self::reject)?;

        debug!("item status updated");
        drop(guard);
        self.refresh().await
    }

    // =========================================================================
    // Helper Functions
    // =========================================================================

    fn require(&self, required: Role) -> Result<(), OrderError> {
        let actual = self.inner.identity.role;
        if actual == required {
            Ok(())
        } else {
            warn!(%required, %actual, "order command rejected for role");
            Err(OrderError::WrongRole { required, actual })
        }
    }

    fn reject(err: ApiError) -> OrderError {
        capture(&err);
        OrderError::Api(err)
    }

    fn next_ticket(&self) -> u64 {
        self.inner.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install a scoped load unless a newer one already landed.
    fn apply<F>(&self, ticket: u64, update: F) -> Arc<TrackerView>
    where
        F: FnOnce(&mut TrackerView),
    {
        let applied = self.inner.view.send_if_modified(|view| {
            if ticket <= view.applied_ticket {
                return false;
            }
            let next = Arc::make_mut(view);
            update(next);
            next.applied_ticket = ticket;
            true
        });
        if !applied {
            debug!(ticket, "discarding stale order response");
        }
        self.view()
    }
}

impl std::fmt::Debug for OrderStatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStatusTracker")
            .field("identity", &self.inner.identity)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use agroshop_core::UserId;
    use url::Url;

    use super::*;
    use crate::api::MemoryTokenStore;
    use crate::config::ApiConfig;

    const ORDER_ID: &str = "6f1c2a3e-7b4d-4c1a-9e2f-0a1b2c3d4e5f";

    fn tracker(identity: Identity, policy: TransitionPolicy) -> OrderStatusTracker {
        let config = ApiConfig {
            base_url: Url::parse("http://127.0.0.1:9/").unwrap(),
            timeout: Duration::from_secs(1),
        };
        let api = ApiClient::new(&config, Arc::new(MemoryTokenStore::default())).unwrap();
        let orders = OrdersConfig {
            transition_policy: policy,
            ..OrdersConfig::default()
        };
        OrderStatusTracker::new(api, identity, &orders)
    }

    fn item(id: i64, vendor: i64, status: OrderStatus, subtotal: &str) -> OrderItem {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "product_name": format!("Item {id}"),
            "quantity": 1,
            "unit_price": subtotal,
            "subtotal": subtotal,
            "status": status,
            "vendor": vendor,
        }))
        .unwrap()
    }

    fn order(status: OrderStatus, items: Vec<OrderItem>) -> Order {
        let mut order: Order = serde_json::from_value(serde_json::json!({
            "uuid": ORDER_ID,
            "order_number": "ORD-1",
            "status": status,
            "total_price": "0",
            "created_at": "2026-01-05T10:00:00Z",
        }))
        .unwrap();
        order.items = items;
        order
    }

    fn load_order(tracker: &OrderStatusTracker, order: Order) {
        let id = order.uuid;
        tracker.apply(tracker.next_ticket(), |view| {
            view.scope = Some(ViewScope::Order(id));
            view.order = Some(order);
        });
    }

    #[tokio::test]
    async fn test_cancel_rejected_for_shipped_order_without_change() {
        let tracker = tracker(Identity::customer(UserId::new(1)), TransitionPolicy::Permissive);
        load_order(&tracker, order(OrderStatus::Shipped, vec![]));

        let err = tracker.cancel(None).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::NotCancellable {
                status: OrderStatus::Shipped
            }
        ));
        assert_eq!(
            tracker.view().order.as_ref().unwrap().status,
            OrderStatus::Shipped
        );
    }

    #[tokio::test]
    async fn test_cancel_rejected_for_every_non_cancellable_status() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let tracker = tracker(Identity::customer(UserId::new(1)), TransitionPolicy::Permissive);
            load_order(&tracker, order(status, vec![]));
            assert!(matches!(
                tracker.cancel(Some("changed my mind")).await,
                Err(OrderError::NotCancellable { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_cancel_without_order() {
        let tracker = tracker(Identity::customer(UserId::new(1)), TransitionPolicy::Permissive);
        assert!(matches!(
            tracker.cancel(None).await,
            Err(OrderError::NoOrderLoaded)
        ));
    }

    #[tokio::test]
    async fn test_cancel_requires_customer() {
        let tracker = tracker(Identity::vendor(UserId::new(1)), TransitionPolicy::Permissive);
        assert!(matches!(
            tracker.cancel(None).await,
            Err(OrderError::WrongRole {
                required: Role::Customer,
                actual: Role::Vendor
            })
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_other_vendors_item() {
        let tracker = tracker(Identity::vendor(UserId::new(7)), TransitionPolicy::Permissive);
        load_order(
            &tracker,
            order(
                OrderStatus::Paid,
                vec![item(1, 7, OrderStatus::Paid, "10"), item(2, 8, OrderStatus::Paid, "20")],
            ),
        );

        assert!(matches!(
            tracker
                .update_item_status(OrderItemId::new(2), OrderStatus::Shipped)
                .await,
            Err(OrderError::NotOwner(_))
        ));
        assert!(matches!(
            tracker
                .update_item_status(OrderItemId::new(99), OrderStatus::Shipped)
                .await,
            Err(OrderError::NotOwner(_))
        ));
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_backwards_transition() {
        let tracker = tracker(Identity::vendor(UserId::new(7)), TransitionPolicy::Strict);
        load_order(
            &tracker,
            order(OrderStatus::Paid, vec![item(1, 7, OrderStatus::Shipped, "10")]),
        );

        let err = tracker
            .update_item_status(OrderItemId::new(1), OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Pending
            }
        ));
        assert!(!tracker.is_updating(OrderItemId::new(1)));
    }

    #[tokio::test]
    async fn test_busy_item_rejects_second_update() {
        let tracker = tracker(Identity::vendor(UserId::new(7)), TransitionPolicy::Permissive);
        load_order(
            &tracker,
            order(OrderStatus::Paid, vec![item(1, 7, OrderStatus::Paid, "10")]),
        );
        let _held = tracker
            .inner
            .updating
            .try_begin(OrderItemId::new(1), Operation::UpdateStatus)
            .unwrap();

        assert!(matches!(
            tracker
                .update_item_status(OrderItemId::new(1), OrderStatus::Processing)
                .await,
            Err(OrderError::ItemBusy(_))
        ));
        assert!(tracker.is_updating(OrderItemId::new(1)));
    }

    #[tokio::test]
    async fn test_vendor_commands_require_vendor() {
        let tracker = tracker(Identity::customer(UserId::new(1)), TransitionPolicy::Permissive);
        assert!(matches!(
            tracker.list_vendor_items().await,
            Err(OrderError::WrongRole { .. })
        ));
        assert!(matches!(
            tracker
                .update_item_status(OrderItemId::new(1), OrderStatus::Paid)
                .await,
            Err(OrderError::WrongRole { .. })
        ));
    }

    #[test]
    fn test_stale_order_response_is_discarded() {
        let tracker = tracker(Identity::customer(UserId::new(1)), TransitionPolicy::Permissive);
        let older = tracker.next_ticket();
        let newer = tracker.next_ticket();

        tracker.apply(newer, |view| view.scope = Some(ViewScope::VendorItems));
        tracker.apply(older, |view| view.scope = None);

        assert_eq!(tracker.view().scope, Some(ViewScope::VendorItems));
    }

    #[test]
    fn test_revenue_over_current_items() {
        let tracker = tracker(Identity::vendor(UserId::new(7)), TransitionPolicy::Permissive);
        load_order(
            &tracker,
            order(
                OrderStatus::Paid,
                vec![item(1, 7, OrderStatus::Paid, "10.50"), item(2, 7, OrderStatus::Paid, "4.25")],
            ),
        );
        assert_eq!(tracker.vendor_revenue(), Decimal::new(1475, 2));
    }
}
