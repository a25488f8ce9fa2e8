//! Plateful client engine library.
//!
//! This crate holds the state the Plateful app shell cannot afford to get
//! wrong: the access/refresh token lifecycle, the persisted cart and order
//! collections, and the persisted UI selection. The shell (pages, forms,
//! notification display) stays thin and calls into the engine through
//! [`state::Plateful`].
//!
//! # Architecture
//!
//! - [`session`] restores a session from the durable refresh credential,
//!   fetches the authenticated user once per session, and owns logout.
//! - [`stores`] holds the cart/order state machine and the UI selection,
//!   both mirrored to durable storage after every mutation.
//! - [`storage`] is the narrow durable key-value capability the stores
//!   persist through, with cross-instance change notification.
//! - [`api`] is the remote boundary: a mockable trait plus the `reqwest`
//!   implementation that carries the refresh cookie.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod models;
pub mod session;
pub mod state;
pub mod storage;
pub mod stores;
