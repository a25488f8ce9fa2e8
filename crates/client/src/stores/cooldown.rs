//! Manual refresh throttling.
//!
//! A user-initiated refresh of remote data is allowed at most once per
//! cooldown window. The timestamp of the last refresh is persisted, so the
//! window spans restarts and, via storage change events, other running
//! instances sharing the same backend: a refresh in one tab throttles them
//! all.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::storage::{self, StorageBackend, keys};

/// Gate in front of user-initiated refetches.
///
/// Cheaply cloneable; all clones share the same window.
#[derive(Clone)]
pub struct RefreshGate {
    inner: Arc<RefreshGateInner>,
}

struct RefreshGateInner {
    storage: Arc<dyn StorageBackend>,
    cooldown: Duration,
    last: Mutex<Option<DateTime<Utc>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshGate {
    /// Load the gate from durable storage.
    ///
    /// A timestamp persisted by an earlier run (or another instance)
    /// counts against the window immediately.
    #[must_use]
    pub fn hydrate(backend: Arc<dyn StorageBackend>, cooldown: Duration) -> Self {
        let last: Option<DateTime<Utc>> =
            storage::load_or_default(backend.as_ref(), keys::REFRESH_COOLDOWN);
        Self {
            inner: Arc::new(RefreshGateInner {
                storage: backend,
                cooldown,
                last: Mutex::new(last),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Spawn the background task that mirrors cooldown writes made by
    /// other instances into this one. Idempotent.
    pub fn start(&self) {
        let mut guard = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return;
        }

        let mut events = self.inner.storage.subscribe();
        let weak = Arc::downgrade(&self.inner);
        *guard = Some(tokio::spawn(async move {
            loop {
                let refresh_written = match events.recv().await {
                    Ok(event) => event.key == keys::REFRESH_COOLDOWN,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "storage event stream lagged");
                        // A skipped event may have been a cooldown write.
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if !refresh_written {
                    continue;
                }
                let Some(inner) = weak.upgrade() else { break };
                inner.mirror_from_storage();
            }
        }));
    }

    /// Run `refetch` unless a refresh happened within the cooldown window.
    ///
    /// Returns whether the refetch ran. The window is claimed before the
    /// refetch starts, so a concurrent trigger observes it as spent.
    pub async fn trigger<F, Fut>(&self, refetch: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.try_claim() {
            debug!("manual refresh suppressed by cooldown");
            return false;
        }
        refetch().await;
        true
    }

    /// Whether a trigger right now would be suppressed.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        let last = *self.inner.lock_last();
        self.inner.within_cooldown(last, Utc::now())
    }

    /// When the last refresh ran, on any instance sharing the backend.
    #[must_use]
    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.lock_last()
    }

    /// Atomically check the window and claim it.
    fn try_claim(&self) -> bool {
        let mut last = self.inner.lock_last();
        let now = Utc::now();
        if self.inner.within_cooldown(*last, now) {
            return false;
        }
        *last = Some(now);
        storage::persist_json(self.inner.storage.as_ref(), keys::REFRESH_COOLDOWN, &now);
        true
    }
}

impl RefreshGateInner {
    fn within_cooldown(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last) = last else { return false };
        match now.signed_duration_since(last).to_std() {
            Ok(elapsed) => elapsed < self.cooldown,
            // A timestamp from the future counts as freshly refreshed.
            Err(_) => true,
        }
    }

    fn mirror_from_storage(&self) {
        let persisted: Option<DateTime<Utc>> =
            storage::load_or_default(self.storage.as_ref(), keys::REFRESH_COOLDOWN);
        *self.lock_last() = persisted;
    }

    fn lock_last(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RefreshGateInner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::storage::MemoryStorage;

    const COOLDOWN: Duration = Duration::from_secs(60);

    fn backend() -> Arc<dyn StorageBackend> {
        Arc::new(MemoryStorage::new())
    }

    async fn count_triggers(gate: &RefreshGate, count: &AtomicU32) -> bool {
        gate.trigger(|| async {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .await
    }

    #[tokio::test]
    async fn test_first_trigger_runs() {
        let gate = RefreshGate::hydrate(backend(), COOLDOWN);
        let count = AtomicU32::new(0);

        assert!(count_triggers(&gate, &count).await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(gate.last_refresh_at().is_some());
    }

    #[tokio::test]
    async fn test_second_trigger_within_window_is_suppressed() {
        let gate = RefreshGate::hydrate(backend(), COOLDOWN);
        let count = AtomicU32::new(0);

        assert!(count_triggers(&gate, &count).await);
        assert!(!count_triggers(&gate, &count).await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persisted_timestamp_throttles_a_fresh_instance() {
        let backend = backend();
        let recent = Utc::now();
        backend
            .put(
                keys::REFRESH_COOLDOWN,
                &serde_json::to_vec(&recent).unwrap(),
            )
            .unwrap();

        let gate = RefreshGate::hydrate(Arc::clone(&backend), COOLDOWN);
        let count = AtomicU32::new(0);

        assert!(gate.is_throttled());
        assert!(!count_triggers(&gate, &count).await);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_persisted_timestamp_allows_a_trigger() {
        let backend = backend();
        let stale = Utc::now() - chrono::TimeDelta::hours(2);
        backend
            .put(keys::REFRESH_COOLDOWN, &serde_json::to_vec(&stale).unwrap())
            .unwrap();

        let gate = RefreshGate::hydrate(Arc::clone(&backend), COOLDOWN);
        let count = AtomicU32::new(0);

        assert!(!gate.is_throttled());
        assert!(count_triggers(&gate, &count).await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_future_timestamp_counts_as_recent() {
        let backend = backend();
        let ahead = Utc::now() + chrono::TimeDelta::hours(1);
        backend
            .put(keys::REFRESH_COOLDOWN, &serde_json::to_vec(&ahead).unwrap())
            .unwrap();

        let gate = RefreshGate::hydrate(Arc::clone(&backend), COOLDOWN);
        assert!(gate.is_throttled());
    }

    #[tokio::test]
    async fn test_write_by_another_instance_is_mirrored() {
        let backend = backend();
        let gate = RefreshGate::hydrate(Arc::clone(&backend), COOLDOWN);
        gate.start();
        assert!(!gate.is_throttled());

        // Another instance sharing the backend claims the window.
        let now = Utc::now();
        backend
            .put(keys::REFRESH_COOLDOWN, &serde_json::to_vec(&now).unwrap())
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !gate.is_throttled() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let count = AtomicU32::new(0);
        assert!(!count_triggers(&gate, &count).await);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let gate = RefreshGate::hydrate(backend(), COOLDOWN);
        gate.start();
        gate.start();
    }
}
