//! Durable key-value storage capability.
//!
//! The engine persists through this narrow interface: synchronous byte-level
//! reads and writes addressed by string key, plus a change-notification
//! stream so a second engine instance sharing the same backing store (the
//! other-tab case) can observe writes it did not make.
//!
//! Stores own their JSON encoding and their recovery policy; the backend
//! never interprets values. No key ever stores the access token.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::broadcast;

/// Storage keys used by the engine.
///
/// Each key is exclusively owned by one store; no two stores share a key.
pub mod keys {
    /// The cart/order aggregate, owned by the cart store.
    pub const CART: &str = "cart";
    /// The UI selection pair, owned by the selection store.
    pub const SELECTION: &str = "selection";
    /// Timestamp of the last manual refresh, owned by the refresh gate.
    pub const REFRESH_COOLDOWN: &str = "refresh_cooldown";
    /// Identity marker for the signed-in user, owned by the session
    /// coordinator. Gates queries that only make sense for a known user.
    pub const USER: &str = "user";
}

/// Errors from the storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing store failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A backend lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Notification that a key was written or removed.
///
/// Carries only the key; interested parties re-read the value through the
/// backend, which also covers the case where the write was a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that changed.
    pub key: String,
}

/// Durable local storage, surviving process restarts.
///
/// Implementations must deliver a [`StorageEvent`] to every subscriber after
/// each successful `put` or `remove`, including for the instance that made
/// the change.
pub trait StorageBackend: Send + Sync {
    /// Read the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store cannot be written.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to change notifications for all keys.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// Hydrate a value from storage, falling back to `T::default()`.
///
/// Absent data is a normal first run. Malformed data is discarded with a
/// warning instead of failing initialization; the store rewrites the key on
/// its next mutation.
pub(crate) fn load_or_default<T>(storage: &dyn StorageBackend, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match storage.get(key) {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key, %error, "discarding malformed persisted data");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(error) => {
            tracing::warn!(key, %error, "storage read failed, starting empty");
            T::default()
        }
    }
}

/// Mirror a value to storage as JSON.
///
/// Persistence failures are logged, never surfaced: a mutation that already
/// applied in memory must not appear to fail because the mirror write did.
pub(crate) fn persist_json<T: Serialize>(storage: &dyn StorageBackend, key: &str, value: &T) {
    let bytes = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(key, %error, "failed to encode state for persistence");
            return;
        }
    };

    if let Err(error) = storage.put(key, &bytes) {
        tracing::warn!(key, %error, "failed to persist state");
    }
}
