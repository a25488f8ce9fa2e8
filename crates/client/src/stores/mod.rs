//! Persisted state stores.
//!
//! Each store owns one durable storage key, mutates in-memory state
//! synchronously, and mirrors the full state to storage after every change.
//! Mutations on typed values are infallible; quantities clamp instead of
//! rejecting. Only untyped input from the wire can be refused.

pub mod cart;
pub mod cooldown;
pub mod selection;

pub use cart::CartStore;
pub use cooldown::RefreshGate;
pub use selection::{Selection, SelectionStore};
