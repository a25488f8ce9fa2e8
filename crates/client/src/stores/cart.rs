//! The cart/order store.
//!
//! Holds the guest cart (staged before checkout, survives logout) and the
//! authenticated user's orders. Every mutation runs to completion in memory
//! and is then mirrored to durable storage under a single key, so a reload
//! resumes exactly where the user left off.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use plateful_core::{MenuItemId, OrderId, OrderStatus, ParseOrderStatusError, Price, RestaurantId};

use crate::models::{CartItem, CartState, MenuItem, Order};
use crate::storage::{self, StorageBackend, keys};

/// Process-wide cart/order state machine.
///
/// Cheaply cloneable; all clones share the same state. Only the operations
/// here may mutate it, and the session coordinator is the sole caller of
/// [`Self::clear_user_orders`].
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn StorageBackend>,
    state: Mutex<CartState>,
}

impl CartStore {
    /// Load the store from durable storage.
    ///
    /// Absent or malformed data falls back to empty collections; corrupt
    /// state must never prevent the app from starting.
    #[must_use]
    pub fn hydrate(backend: Arc<dyn StorageBackend>) -> Self {
        let state: CartState = storage::load_or_default(backend.as_ref(), keys::CART);
        Self {
            inner: Arc::new(CartStoreInner {
                storage: backend,
                state: Mutex::new(state),
            }),
        }
    }

    // =========================================================================
    // Guest cart
    // =========================================================================

    /// Add one unit of `item` to the guest cart.
    ///
    /// A line already present (by menu item ID) is incremented instead of
    /// duplicated.
    pub fn add_to_guest_cart(&self, item: MenuItem) {
        self.mutate(|state| {
            if let Some(line) = state.guest_cart.iter_mut().find(|l| l.item.id == item.id) {
                line.quantity = line.quantity.checked_add(1).unwrap_or(line.quantity);
            } else {
                state.guest_cart.push(CartItem::single(item));
            }
        });
    }

    /// Remove a line entirely. No-op when the item is not in the cart.
    pub fn remove_from_guest_cart(&self, item_id: MenuItemId) {
        self.mutate(|state| {
            state.guest_cart.retain(|line| line.item.id != item_id);
        });
    }

    /// Overwrite a line's quantity. A non-positive quantity removes the
    /// line; a line can never persist at quantity zero.
    pub fn set_quantity(&self, item_id: MenuItemId, quantity: u32) {
        self.mutate(|state| match NonZeroU32::new(quantity) {
            None => state.guest_cart.retain(|line| line.item.id != item_id),
            Some(quantity) => {
                if let Some(line) = state.guest_cart.iter_mut().find(|l| l.item.id == item_id) {
                    line.quantity = quantity;
                }
            }
        });
    }

    /// Increment a line's quantity by one.
    pub fn increase_quantity(&self, item_id: MenuItemId) {
        self.mutate(|state| {
            if let Some(line) = state.guest_cart.iter_mut().find(|l| l.item.id == item_id) {
                line.quantity = line.quantity.checked_add(1).unwrap_or(line.quantity);
            }
        });
    }

    /// Decrement a line's quantity by one, removing the line at one.
    pub fn decrease_quantity(&self, item_id: MenuItemId) {
        self.mutate(|state| {
            let Some(line) = state
                .guest_cart
                .iter_mut()
                .find(|line| line.item.id == item_id)
            else {
                return;
            };

            match NonZeroU32::new(line.quantity.get() - 1) {
                Some(quantity) => line.quantity = quantity,
                None => state.guest_cart.retain(|line| line.item.id != item_id),
            }
        });
    }

    /// Empty the guest cart.
    pub fn clear_guest_cart(&self) {
        self.mutate(|state| state.guest_cart.clear());
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Stage an order from the guest cart lines belonging to `restaurant_id`.
    ///
    /// The drained lines become a new order at [`OrderStatus::Placed`];
    /// lines for other restaurants stay in the cart. Returns `None` when the
    /// cart holds nothing for that restaurant.
    pub fn place_order(&self, restaurant_id: RestaurantId) -> Option<Order> {
        self.mutate(|state| {
            let (for_restaurant, remaining): (Vec<_>, Vec<_>) = state
                .guest_cart
                .drain(..)
                .partition(|line| line.item.restaurant_id == restaurant_id);

            state.guest_cart = remaining;

            if for_restaurant.is_empty() {
                return None;
            }

            let order = Order::place(restaurant_id, for_restaurant);
            state.orders.push(order.clone());
            Some(order)
        })
    }

    /// Insert an order, or replace the existing one with the same ID.
    pub fn add_or_update_order(&self, order: Order) {
        self.mutate(|state| {
            if let Some(existing) = state.orders.iter_mut().find(|o| o.id == order.id) {
                *existing = order;
            } else {
                state.orders.push(order);
            }
        });
    }

    /// Overwrite an order's status.
    ///
    /// The remote system is authoritative for the delivery progression, so
    /// any known status is applied; an implausible change (backwards, or
    /// out of a terminal state) is only logged. Unknown orders are ignored.
    pub fn update_order_status(&self, order_id: OrderId, status: OrderStatus) {
        self.mutate(|state| {
            let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) else {
                debug!(%order_id, "status update for unknown order dropped");
                return;
            };

            if order.status != status && !order.status.can_transition_to(status) {
                debug!(
                    %order_id,
                    from = %order.status,
                    to = %status,
                    "implausible status change applied"
                );
            }
            order.status = status;
        });
    }

    /// Apply a status update that arrived as a raw string (e.g., from a
    /// push notification payload).
    ///
    /// # Errors
    ///
    /// Returns [`ParseOrderStatusError`] for an unknown status value,
    /// leaving the store unchanged.
    pub fn update_order_status_raw(
        &self,
        order_id: OrderId,
        status: &str,
    ) -> Result<(), ParseOrderStatusError> {
        let status = status.parse::<OrderStatus>()?;
        self.update_order_status(order_id, status);
        Ok(())
    }

    /// Delete an order the remote system never confirmed (e.g., an
    /// abandoned checkout). No-op for unknown IDs.
    pub fn remove_unsubmitted_order(&self, order_id: OrderId) {
        self.mutate(|state| {
            state.orders.retain(|order| order.id != order_id);
        });
    }

    /// Empty the user-scoped order collection, leaving the guest cart
    /// untouched.
    ///
    /// Called exclusively by the session coordinator's logout path: a
    /// logged-out visitor keeps items staged before authenticating.
    pub fn clear_user_orders(&self) {
        self.mutate(|state| state.orders.clear());
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the full state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.lock().clone()
    }

    /// Snapshot of the guest cart lines.
    #[must_use]
    pub fn guest_cart(&self) -> Vec<CartItem> {
        self.lock().guest_cart.clone()
    }

    /// Snapshot of the user's orders.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    /// Number of units across all guest cart lines, for the cart badge.
    #[must_use]
    pub fn guest_item_count(&self) -> u32 {
        self.lock().guest_cart_units()
    }

    /// Total price of the guest cart.
    #[must_use]
    pub fn guest_total(&self) -> Price {
        self.lock().guest_cart_total()
    }

    /// Look up a single order.
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.lock().orders.iter().find(|o| o.id == order_id).cloned()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply a mutation and mirror the result to storage before returning.
    ///
    /// The lock is held across the mirror write, so no reader observes a
    /// state that has not been handed to the backend yet.
    fn mutate<R>(&self, apply: impl FnOnce(&mut CartState) -> R) -> R {
        let mut state = self.lock();
        let result = apply(&mut state);
        storage::persist_json(self.inner.storage.as_ref(), keys::CART, &*state);
        result
    }

    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use plateful_core::{CurrencyCode, Price};

    fn store() -> CartStore {
        CartStore::hydrate(Arc::new(MemoryStorage::new()))
    }

    fn item(id: i32) -> MenuItem {
        item_for(id, 1)
    }

    fn item_for(id: i32, restaurant: i32) -> MenuItem {
        MenuItem {
            id: MenuItemId::new(id),
            restaurant_id: RestaurantId::new(restaurant),
            name: format!("item-{id}"),
            description: None,
            price: Price::from_minor_units(500, CurrencyCode::USD),
            image_url: None,
        }
    }

    fn quantity_of(store: &CartStore, id: i32) -> Option<u32> {
        store
            .guest_cart()
            .iter()
            .find(|line| line.item.id == MenuItemId::new(id))
            .map(|line| line.quantity.get())
    }

    #[test]
    fn test_badge_reads_aggregate_the_guest_cart() {
        let store = store();
        store.add_to_guest_cart(item(1));
        store.add_to_guest_cart(item(1));
        store.add_to_guest_cart(item(2));

        assert_eq!(store.guest_item_count(), 3);
        assert_eq!(
            store.guest_total().amount,
            rust_decimal::Decimal::new(1500, 2)
        );
    }

    #[test]
    fn test_repeated_adds_merge_into_one_line() {
        let store = store();

        store.add_to_guest_cart(item(1));
        store.add_to_guest_cart(item(2));
        store.add_to_guest_cart(item(1));
        store.add_to_guest_cart(item(1));

        let cart = store.guest_cart();
        assert_eq!(cart.len(), 2);
        assert_eq!(quantity_of(&store, 1), Some(3));
        assert_eq!(quantity_of(&store, 2), Some(1));
    }

    #[test]
    fn test_decrease_at_one_removes_the_line() {
        let store = store();
        store.add_to_guest_cart(item(1));
        store.add_to_guest_cart(item(1));

        store.decrease_quantity(MenuItemId::new(1));
        assert_eq!(quantity_of(&store, 1), Some(1));

        store.decrease_quantity(MenuItemId::new(1));
        assert_eq!(quantity_of(&store, 1), None);
        assert!(store.guest_cart().is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let store = store();
        store.add_to_guest_cart(item(1));

        store.set_quantity(MenuItemId::new(1), 5);
        assert_eq!(quantity_of(&store, 1), Some(5));

        store.set_quantity(MenuItemId::new(1), 0);
        assert_eq!(quantity_of(&store, 1), None);
    }

    #[test]
    fn test_mutations_on_absent_items_are_noops() {
        let store = store();
        store.remove_from_guest_cart(MenuItemId::new(9));
        store.increase_quantity(MenuItemId::new(9));
        store.decrease_quantity(MenuItemId::new(9));
        store.set_quantity(MenuItemId::new(9), 3);
        assert!(store.guest_cart().is_empty());
    }

    #[test]
    fn test_state_survives_rehydration() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());

        let store = CartStore::hydrate(Arc::clone(&backend));
        store.add_to_guest_cart(item(1));
        store.add_to_guest_cart(item(1));
        let placed = store.place_order(RestaurantId::new(1)).unwrap();

        let reloaded = CartStore::hydrate(backend);
        assert_eq!(reloaded.state(), store.state());
        assert_eq!(reloaded.order(placed.id).unwrap(), placed);
    }

    #[test]
    fn test_hydrate_recovers_from_corrupt_data() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        backend.put(keys::CART, b"{\"guest_cart\": 41}").unwrap();

        let store = CartStore::hydrate(backend);
        assert!(store.guest_cart().is_empty());
        assert!(store.orders().is_empty());
    }

    #[test]
    fn test_place_order_takes_only_matching_lines() {
        let store = store();
        store.add_to_guest_cart(item_for(1, 1));
        store.add_to_guest_cart(item_for(2, 2));

        let order = store.place_order(RestaurantId::new(1)).unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.status, OrderStatus::Placed);

        // The other restaurant's line is still staged.
        assert_eq!(store.guest_cart().len(), 1);
        assert_eq!(quantity_of(&store, 2), Some(1));
    }

    #[test]
    fn test_place_order_with_empty_cart() {
        let store = store();
        assert!(store.place_order(RestaurantId::new(1)).is_none());
        assert!(store.orders().is_empty());
    }

    #[test]
    fn test_add_or_update_order_upserts_by_id() {
        let store = store();
        store.add_to_guest_cart(item(1));
        let mut order = store.place_order(RestaurantId::new(1)).unwrap();

        order.status = OrderStatus::Accepted;
        store.add_or_update_order(order.clone());

        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.order(order.id).unwrap().status, OrderStatus::Accepted);
    }

    #[test]
    fn test_update_order_status_applies_any_known_status() {
        let store = store();
        store.add_to_guest_cart(item(1));
        let order = store.place_order(RestaurantId::new(1)).unwrap();

        store.update_order_status(order.id, OrderStatus::Preparing);
        assert_eq!(
            store.order(order.id).unwrap().status,
            OrderStatus::Preparing
        );

        // Backwards moves are applied too; the server is authoritative.
        store.update_order_status(order.id, OrderStatus::Placed);
        assert_eq!(store.order(order.id).unwrap().status, OrderStatus::Placed);
    }

    #[test]
    fn test_update_order_status_raw_rejects_unknown_values() {
        let store = store();
        store.add_to_guest_cart(item(1));
        let order = store.place_order(RestaurantId::new(1)).unwrap();

        let result = store.update_order_status_raw(order.id, "teleported");
        assert!(result.is_err());
        assert_eq!(store.order(order.id).unwrap().status, OrderStatus::Placed);

        store
            .update_order_status_raw(order.id, "rider_on_the_way")
            .unwrap();
        assert_eq!(
            store.order(order.id).unwrap().status,
            OrderStatus::RiderOnTheWay
        );
    }

    #[test]
    fn test_remove_unsubmitted_order() {
        let store = store();
        store.add_to_guest_cart(item(1));
        let order = store.place_order(RestaurantId::new(1)).unwrap();

        store.remove_unsubmitted_order(order.id);
        assert!(store.orders().is_empty());
    }

    #[test]
    fn test_clear_user_orders_leaves_guest_cart() {
        let store = store();
        store.add_to_guest_cart(item_for(1, 1));
        store.add_to_guest_cart(item_for(2, 1));
        store.place_order(RestaurantId::new(1));
        store.add_to_guest_cart(item_for(3, 2));

        store.clear_user_orders();

        assert!(store.orders().is_empty());
        assert_eq!(store.guest_cart().len(), 1);
    }
}
