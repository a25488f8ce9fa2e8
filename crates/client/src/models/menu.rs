//! Menu domain types.

use serde::{Deserialize, Serialize};

use plateful_core::{MenuItemId, Price, RestaurantId};

/// A dish on a restaurant's menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Unique menu item ID.
    pub id: MenuItemId,
    /// Restaurant this item belongs to.
    pub restaurant_id: RestaurantId,
    /// Dish name.
    pub name: String,
    /// Short description shown on the menu card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit price.
    pub price: Price,
    /// Image URL for the menu card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
