//! Domain models for the client engine.
//!
//! These are the shapes the engine persists and hands to the shell. They are
//! plain data; all mutation goes through the stores in [`crate::stores`].

pub mod menu;
pub mod order;
pub mod user;

pub use menu::MenuItem;
pub use order::{CartItem, CartState, Order};
pub use user::{Address, UserProfile};
