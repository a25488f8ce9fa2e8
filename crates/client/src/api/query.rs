//! Fetch-once query cache with a single transient retry.
//!
//! Mirrors the "enabled while a precondition holds, retry once, never goes
//! stale" fetch discipline the session layer needs: a value is fetched the
//! first time it is asked for, kept for the rest of the session, and a
//! failure is remembered instead of being retried in the background.

use std::future::Future;

use tokio::sync::Mutex;

use super::ApiError;

/// Result of asking a [`CachedQuery`] for its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome<T> {
    /// The precondition does not hold and nothing is cached; no fetch ran.
    Disabled,
    /// The cached or freshly fetched value.
    Ready(T),
    /// The fetch failed after its retry. Sticky until invalidated.
    Failed,
}

impl<T> QueryOutcome<T> {
    /// The value, if this outcome carries one.
    #[must_use]
    pub fn into_ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Disabled | Self::Failed => None,
        }
    }
}

enum QueryState<T> {
    Idle,
    Ready(T),
    Failed,
}

/// A lazily fetched, session-lifetime cached value.
///
/// Concurrent callers coalesce: the state lock is held across the fetch, so
/// a second caller waits for the first fetch instead of launching its own.
pub struct CachedQuery<T> {
    name: &'static str,
    state: Mutex<QueryState<T>>,
}

impl<T: Clone> CachedQuery<T> {
    /// Create an empty query. `name` labels log lines.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(QueryState::Idle),
        }
    }

    /// Resolve the value, fetching it if nothing is cached yet.
    ///
    /// `enabled` gates dispatch only: a cached value (or remembered failure)
    /// is returned regardless, but no fetch is started while `enabled` is
    /// false. A transient fetch error is retried once; any other error, or a
    /// second transient one, marks the query [`QueryOutcome::Failed`] until
    /// [`Self::invalidate`] is called.
    pub async fn resolve<F, Fut>(&self, enabled: bool, fetch: F) -> QueryOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut state = self.state.lock().await;

        match &*state {
            QueryState::Ready(value) => return QueryOutcome::Ready(value.clone()),
            QueryState::Failed => return QueryOutcome::Failed,
            QueryState::Idle => {}
        }

        if !enabled {
            return QueryOutcome::Disabled;
        }

        match self.fetch_with_retry(fetch).await {
            Ok(value) => {
                *state = QueryState::Ready(value.clone());
                QueryOutcome::Ready(value)
            }
            Err(error) => {
                tracing::warn!(query = self.name, %error, "query failed after retry");
                *state = QueryState::Failed;
                QueryOutcome::Failed
            }
        }
    }

    async fn fetch_with_retry<F, Fut>(&self, fetch: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match fetch().await {
            Ok(value) => Ok(value),
            Err(error) if error.is_transient() => {
                tracing::debug!(query = self.name, %error, "transient failure, retrying once");
                fetch().await
            }
            Err(error) => Err(error),
        }
    }

    /// Install a value obtained out of band (e.g., returned by a login
    /// call), skipping the fetch entirely.
    pub async fn prime(&self, value: T) {
        *self.state.lock().await = QueryState::Ready(value);
    }

    /// Forget the cached value or failure. The next enabled resolve
    /// fetches again.
    pub async fn invalidate(&self) {
        *self.state.lock().await = QueryState::Idle;
    }

    /// The cached value, without fetching.
    pub async fn peek(&self) -> Option<T> {
        match &*self.state.lock().await {
            QueryState::Ready(value) => Some(value.clone()),
            QueryState::Idle | QueryState::Failed => None,
        }
    }

    /// Whether the query is in its sticky failed state.
    pub async fn is_failed(&self) -> bool {
        matches!(&*self.state.lock().await, QueryState::Failed)
    }
}
