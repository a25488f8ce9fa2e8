//! Plateful Core - Shared types library.
//!
//! This crate provides common types used across all Plateful components:
//! - `client` - Client-side session and ordering engine (this repository)
//! - the backend services and role apps (customer, vendor, rider, admin)
//!   that live in their own repositories
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, roles,
//!   and the order delivery-status progression

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
