//! `CartStore` - mirror of the server cart plus local selection.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use agroshop_core::pricing::{self, CartTotals};
use agroshop_core::{Cart, CartId, CartItem, CartItemId, Product, ProductId, Selection};
use serde::Serialize;
use serde::de::IgnoredAny;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use super::{CartError, CartTarget};
use crate::api::{ApiClient, paths};
use crate::error::{ApiError, add_breadcrumb, capture};
use crate::inflight::{InFlight, Operation};

/// Point-in-time view of the cart.
#[derive(Debug, Clone, Default)]
pub struct CartSnapshot {
    /// Last cart the server returned; `None` before the first fetch or when
    /// the user has no cart.
    pub cart: Option<Cart>,
    /// Checkout selection, reconciled against `cart`.
    pub selection: Selection,
    /// Totals over the selected lines.
    pub totals: CartTotals,
    /// Whether any fetch has completed.
    pub loaded: bool,
    applied_ticket: u64,
}

impl CartSnapshot {
    /// Server ID of the cart, if one exists.
    #[must_use]
    pub fn cart_id(&self) -> Option<CartId> {
        self.cart.as_ref().map(|cart| cart.id)
    }

    /// Cart lines; empty when there is no cart.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        self.cart.as_ref().map_or(&[], |cart| cart.items.as_slice())
    }

    /// A line by ID.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.cart.as_ref().and_then(|cart| cart.item(id))
    }

    /// Whether a line is selected for checkout.
    #[must_use]
    pub fn is_selected(&self, id: CartItemId) -> bool {
        self.selection.is_selected(id)
    }

    /// Lines selected for checkout.
    pub fn selected_items(&self) -> impl Iterator<Item = &CartItem> {
        self.items()
            .iter()
            .filter(|item| self.selection.is_selected(item.id))
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    fn recompute(&mut self) {
        self.totals = pricing::cart_totals(self.items(), &self.selection);
    }
}

#[derive(Serialize)]
struct AddToCartRequest {
    product_id: ProductId,
    quantity: u32,
}

#[derive(Serialize)]
struct UpdateQuantityRequest {
    quantity: u32,
}

#[derive(Serialize)]
struct RemoveItemRequest {
    action: &'static str,
}

/// Server-backed cart with a client-local checkout selection.
///
/// Every successful mutation is followed by a full refetch; the refetched
/// cart replaces local state wholesale. Cheap to clone.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    api: ApiClient,
    state: watch::Sender<Arc<CartSnapshot>>,
    in_flight: InFlight<CartTarget>,
    /// Last fetch ticket issued. Responses carrying an older ticket than the
    /// one already applied are discarded.
    tickets: AtomicU64,
}

impl CartStore {
    /// Create an empty, unloaded store.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                state: watch::Sender::new(Arc::new(CartSnapshot::default())),
                in_flight: InFlight::default(),
                tickets: AtomicU64::new(0),
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current cart state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CartSnapshot> {
        self.inner.state.borrow().clone()
    }

    /// Watch the cart state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<CartSnapshot>> {
        self.inner.state.subscribe()
    }

    /// Totals over the current selection.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        self.inner.state.borrow().totals
    }

    /// Whether a command is running against `target`.
    #[must_use]
    pub fn is_busy(&self, target: CartTarget) -> bool {
        self.inner.in_flight.is_busy(&target)
    }

    /// Busy entities and what holds them.
    #[must_use]
    pub fn in_flight(&self) -> &InFlight<CartTarget> {
        &self.inner.in_flight
    }

    // =========================================================================
    // Server commands
    // =========================================================================

    /// Load the cart from the server.
    ///
    /// A 404 means the user has no cart yet and yields an empty snapshot.
    /// If a newer fetch has already been applied, this response is dropped
    /// and the current snapshot is returned.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Api` if the request fails; local state is kept.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Arc<CartSnapshot>, CartError> {
        let ticket = self.inner.tickets.fetch_add(1, Ordering::SeqCst) + 1;

        let cart = self
            .inner
            .api
            .get_optional::<Cart>(paths::CART)
            .await
            .map_err(|err| {
                capture(&err);
                CartError::Api(err)
            })?;

        Ok(self.apply(ticket, cart))
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero, `CartError::Busy` while
    /// the same product is being added, or the server's rejection.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let body = AddToCartRequest {
            product_id,
            quantity,
        };
        self.mutate(
            CartTarget::Product(product_id),
            Operation::Add,
            self.inner
                .api
                .post::<_, IgnoredAny>(paths::CART_ADD, &body),
        )
        .await
    }

    /// Add a product, checking the requested quantity against its reported
    /// stock first.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InsufficientStock` when the product reports fewer
    /// units than requested; otherwise as [`CartStore::add`].
    pub async fn add_product(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.has_stock_for(quantity) {
            return Err(CartError::InsufficientStock {
                available: product.stock.unwrap_or(0),
            });
        }
        self.add(product.id, quantity).await
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Busy` while another command holds the line, or
    /// the server's rejection (e.g. insufficient stock) verbatim.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn set_quantity(
        &self,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        if quantity <= 0 {
            return self.remove(item_id).await;
        }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity)?;

        let path = paths::cart_item(item_id);
        let body = UpdateQuantityRequest { quantity };
        self.mutate(
            CartTarget::Item(item_id),
            Operation::SetQuantity,
            self.inner.api.put::<_, IgnoredAny>(&path, &body),
        )
        .await
    }

    /// Raise a line's quantity by one.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the loaded cart;
    /// otherwise as [`CartStore::set_quantity`].
    pub async fn increment(&self, item_id: CartItemId) -> Result<Arc<CartSnapshot>, CartError> {
        let current = self.quantity_of(item_id)?;
        self.set_quantity(item_id, i64::from(current) + 1).await
    }

    /// Lower a line's quantity by one, removing it at zero.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the loaded cart;
    /// otherwise as [`CartStore::set_quantity`].
    pub async fn decrement(&self, item_id: CartItemId) -> Result<Arc<CartSnapshot>, CartError> {
        let current = self.quantity_of(item_id)?;
        self.set_quantity(item_id, i64::from(current) - 1).await
    }

    /// Remove a line entirely.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Busy` while another command holds the line, or the
    /// server's rejection.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: CartItemId) -> Result<Arc<CartSnapshot>, CartError> {
        let path = paths::cart_item(item_id);
        let body = RemoveItemRequest {
            action: "remove_all",
        };
        self.mutate(
            CartTarget::Item(item_id),
            Operation::Remove,
            self.inner.api.delete(&path, Some(&body)),
        )
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Busy` while a clear is already running, or the
    /// server's rejection.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<Arc<CartSnapshot>, CartError> {
        self.mutate(
            CartTarget::Cart,
            Operation::Clear,
            self.inner.api.delete::<()>(paths::CART_CLEAR, None),
        )
        .await
    }

    // =========================================================================
    // Selection (local only)
    // =========================================================================

    /// Flip a line's selection. Returns the new flag.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the loaded cart.
    pub fn toggle_selected(&self, item_id: CartItemId) -> Result<bool, CartError> {
        let mut flipped = None;
        self.inner.state.send_if_modified(|snapshot| {
            if !snapshot.selection.contains(item_id) {
                return false;
            }
            let next = Arc::make_mut(snapshot);
            flipped = next.selection.toggle(item_id);
            next.recompute();
            true
        });
        flipped.ok_or(CartError::UnknownItem(item_id))
    }

    /// Set a line's selection.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the loaded cart.
    pub fn set_selected(&self, item_id: CartItemId, selected: bool) -> Result<(), CartError> {
        let known = self.inner.state.send_if_modified(|snapshot| {
            if !snapshot.selection.contains(item_id) {
                return false;
            }
            let next = Arc::make_mut(snapshot);
            next.selection.set(item_id, selected);
            next.recompute();
            true
        });
        if known {
            Ok(())
        } else {
            Err(CartError::UnknownItem(item_id))
        }
    }

    /// Select or deselect every line.
    pub fn select_all(&self, selected: bool) {
        self.inner.state.send_modify(|snapshot| {
            let next = Arc::make_mut(snapshot);
            next.selection.set_all(selected);
            next.recompute();
        });
    }

    /// Forget every selection choice. Lines still present after the next
    /// fetch come back selected.
    pub fn reset_selection(&self) {
        self.inner.state.send_modify(|snapshot| {
            let next = Arc::make_mut(snapshot);
            next.selection.clear();
            next.recompute();
        });
    }

    // =========================================================================
    // Helper Functions
    // =========================================================================

    fn quantity_of(&self, item_id: CartItemId) -> Result<u32, CartError> {
        self.inner
            .state
            .borrow()
            .item(item_id)
            .map(|item| item.quantity)
            .ok_or(CartError::UnknownItem(item_id))
    }

    /// Run a mutation while holding `target` busy, then refetch.
    ///
    /// The request future is only polled once the target has been claimed.
    async fn mutate<T>(
        &self,
        target: CartTarget,
        operation: Operation,
        request: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        let Some(_guard) = self.inner.in_flight.try_begin(target, operation) else {
            warn!(%target, %operation, "rejecting overlapping cart command");
            return Err(CartError::Busy(target));
        };

        let description = format!("{operation} {target}");
        add_breadcrumb("cart", &description, None);

        if let Err(err) = request.await {
            capture(&err);
            return Err(CartError::Api(err));
        }

        self.fetch().await.map_err(|err| match err {
            CartError::Api(api) => CartError::RefreshFailed(api),
            other => other,
        })
    }

    /// Install a fetched cart unless a newer fetch already landed.
    fn apply(&self, ticket: u64, cart: Option<Cart>) -> Arc<CartSnapshot> {
        let applied = self.inner.state.send_if_modified(|snapshot| {
            if ticket <= snapshot.applied_ticket {
                return false;
            }
            let next = Arc::make_mut(snapshot);
            next.selection.reconcile(
                cart.iter()
                    .flat_map(|cart| cart.items.iter().map(|item| item.id)),
            );
            next.cart = cart;
            next.loaded = true;
            next.applied_ticket = ticket;
            next.recompute();
            true
        });

        if !applied {
            debug!(ticket, "discarding stale cart response");
        }
        self.snapshot()
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
