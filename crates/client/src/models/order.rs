//! Cart and order domain types.

use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plateful_core::{CurrencyCode, OrderId, OrderStatus, Price, RestaurantId};

use super::menu::MenuItem;

/// A line in the guest cart or in a staged order.
///
/// The quantity is non-zero by construction. A line whose quantity would
/// drop to zero is removed from its collection instead, so persisted state
/// never contains a zero or negative quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The menu item being ordered.
    pub item: MenuItem,
    /// How many of it.
    pub quantity: NonZeroU32,
}

impl CartItem {
    /// A single unit of the given item.
    #[must_use]
    pub const fn single(item: MenuItem) -> Self {
        Self {
            item,
            quantity: NonZeroU32::MIN,
        }
    }

    /// Price of this line (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.item.price.times(self.quantity.get())
    }
}

/// An order staged or confirmed for the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Client-minted order ID.
    pub id: OrderId,
    /// Restaurant the order was placed with.
    pub restaurant_id: RestaurantId,
    /// Ordered lines.
    pub items: Vec<CartItem>,
    /// Total price across all lines.
    pub total: Price,
    /// Where the order is in its delivery lifecycle.
    pub status: OrderStatus,
    /// When the order was placed.
    pub placed_at: DateTime<Utc>,
}

impl Order {
    /// Stage a new order from cart lines.
    ///
    /// Mints a fresh ID, computes the total, and starts the order at
    /// [`OrderStatus::Placed`].
    #[must_use]
    pub fn place(restaurant_id: RestaurantId, items: Vec<CartItem>) -> Self {
        let total = total_of(&items);
        Self {
            id: OrderId::generate(),
            restaurant_id,
            items,
            total,
            status: OrderStatus::Placed,
            placed_at: Utc::now(),
        }
    }
}

/// The persisted cart/order aggregate.
///
/// `guest_cart` holds lines staged before checkout (it survives logout, so a
/// returning visitor keeps what they picked). `orders` is user-scoped and is
/// emptied when the session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    /// Lines staged before checkout, unique by menu item ID.
    #[serde(default)]
    pub guest_cart: Vec<CartItem>,
    /// The authenticated user's orders, unique by order ID.
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl CartState {
    /// Total price of the guest cart.
    #[must_use]
    pub fn guest_cart_total(&self) -> Price {
        total_of(&self.guest_cart)
    }

    /// Number of units across all guest cart lines.
    #[must_use]
    pub fn guest_cart_units(&self) -> u32 {
        self.guest_cart
            .iter()
            .fold(0, |acc, line| acc.saturating_add(line.quantity.get()))
    }
}

/// Sum line totals. An empty slice totals to zero in the default currency;
/// lines in a foreign currency are skipped rather than summed wrongly.
fn total_of(items: &[CartItem]) -> Price {
    let currency = items
        .first()
        .map_or_else(CurrencyCode::default, |line| line.item.price.currency_code);

    items
        .iter()
        .map(CartItem::line_total)
        .fold(Price::zero(currency), |acc, line| {
            acc.checked_add(&line).unwrap_or(acc)
        })
}
