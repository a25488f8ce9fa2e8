//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{StorageBackend, StorageError, StorageEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Volatile storage backend for tests and ephemeral embedding.
///
/// Share a single instance (behind `Arc`) between two engine instances to
/// model two tabs over the same browser storage.
#[derive(Debug)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn notify(&self, key: &str) {
        // No subscribers is a valid state; the send result is irrelevant.
        let _ = self.events.send(StorageEvent {
            key: key.to_owned(),
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        {
            let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
            entries.insert(key.to_owned(), value.to_vec());
        }
        self.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
            entries.remove(key).is_some()
        };
        if removed {
            self.notify(key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
