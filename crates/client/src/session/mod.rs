//! Session lifecycle.
//!
//! The [`SessionCoordinator`] owns the in-memory access token, restores a
//! session from the durable refresh credential at startup, loads the
//! authenticated user's profile and addresses, and tears everything down on
//! logout. Collaborators request teardown through the [`SessionBus`] instead
//! of holding a coordinator reference.

pub mod events;
mod token;

pub use events::{LogoutReason, SessionBus, SessionSignal};

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use plateful_core::{Email, UserId};

use self::token::TokenStore;
use crate::api::{AccessToken, CachedQuery, QueryOutcome, RemoteApi};
use crate::models::{Address, UserProfile};
use crate::storage::{self, StorageBackend, keys};
use crate::stores::{CartStore, SelectionStore};

/// Route the shell navigates to after a logout.
pub const LANDING_ROUTE: &str = "/";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session; nothing in flight.
    #[default]
    Unauthenticated,
    /// The startup restore is exchanging the durable credential for a token.
    Restoring,
    /// A user is signed in.
    Authenticated,
    /// Teardown is in progress.
    LoggingOut,
}

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// The signed-in user, once loaded.
    pub user: Option<UserProfile>,
    /// Whether loading the user failed after its retry.
    pub error: bool,
}

impl SessionSnapshot {
    /// A session counts as authenticated only with a loaded user and no
    /// load error.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some() && !self.error
    }
}

/// Durable breadcrumb identifying who was signed in on this device.
///
/// Gates the address fetch and lets the shell greet a returning user. It
/// carries no credential; the access token is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMarker {
    /// Server-side user ID.
    pub id: UserId,
    /// Email the user signed in with.
    pub email: Email,
}

/// Drives the session through restore, sign-in, and teardown.
///
/// Cheaply cloneable; all clones share the same session.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    api: Arc<dyn RemoteApi>,
    storage: Arc<dyn StorageBackend>,
    tokens: TokenStore,
    bus: SessionBus,
    cart: CartStore,
    selection: SelectionStore,
    restore_once: OnceCell<()>,
    user_query: CachedQuery<UserProfile>,
    addresses_query: CachedQuery<Vec<Address>>,
    snapshot: watch::Sender<SessionSnapshot>,
    logout_guard: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionCoordinator {
    /// Wire a coordinator over its collaborators.
    ///
    /// `cart` and `selection` are the stores whose user-scoped state the
    /// logout path clears; call [`Self::start`] afterwards to react to
    /// forced-logout signals on `bus`.
    #[must_use]
    pub fn new(
        api: Arc<dyn RemoteApi>,
        storage: Arc<dyn StorageBackend>,
        bus: SessionBus,
        cart: CartStore,
        selection: SelectionStore,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(CoordinatorInner {
                api,
                storage,
                tokens: TokenStore::default(),
                bus,
                cart,
                selection,
                restore_once: OnceCell::new(),
                user_query: CachedQuery::new("current_user"),
                addresses_query: CachedQuery::new("addresses"),
                snapshot,
                logout_guard: tokio::sync::Mutex::new(()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Spawn the listener that turns [`SessionSignal::ForceLogout`] into a
    /// logout. Idempotent; the task ends with the coordinator.
    pub fn start(&self) {
        let mut guard = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return;
        }

        let mut signals = self.inner.bus.subscribe();
        let weak = Arc::downgrade(&self.inner);
        *guard = Some(tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(SessionSignal::ForceLogout { reason }) => {
                        let Some(inner) = weak.upgrade() else { break };
                        SessionCoordinator { inner }.logout_with(reason).await;
                    }
                    // Stacked signals collapse into the logout already run.
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Try to restore a session from the durable refresh credential.
    ///
    /// Runs at most once per process, and not at all when a token is
    /// already in memory (a login beat it). Failure is a normal outcome
    /// for a signed-out visitor and stays silent.
    pub async fn restore(&self) {
        self.inner
            .restore_once
            .get_or_init(|| self.restore_inner())
            .await;
    }

    async fn restore_inner(&self) {
        if self.inner.tokens.is_present() {
            debug!("session restore skipped; a token is already held");
            return;
        }

        self.set_phase(SessionPhase::Restoring);
        match self.inner.api.refresh().await {
            Ok(token) => {
                self.inner.tokens.set(token);
                self.fetch_user().await;
            }
            Err(error) => {
                debug!(%error, "session restore found no usable credential");
                self.set_phase(SessionPhase::Unauthenticated);
            }
        }
    }

    /// Hand over a token obtained from the login flow and load the user.
    pub async fn complete_login(&self, token: AccessToken) {
        self.inner.tokens.set(token);
        // The token may belong to a different user than anything cached.
        self.inner.user_query.invalidate().await;
        self.inner.addresses_query.invalidate().await;
        self.fetch_user().await;
    }

    /// Load the authenticated user, fetching at most once per session.
    ///
    /// Does nothing without a token. On success the snapshot carries the
    /// user, the durable marker is written, and the address book is loaded;
    /// on failure the snapshot reports the error state.
    pub async fn fetch_user(&self) {
        let Some(token) = self.inner.tokens.get() else {
            debug!("user fetch skipped without a token");
            return;
        };

        let outcome = self
            .inner
            .user_query
            .resolve(true, || {
                let api = Arc::clone(&self.inner.api);
                let token = token.clone();
                async move { api.fetch_current_user(&token).await }
            })
            .await;

        match outcome {
            QueryOutcome::Ready(user) => {
                let committed = self
                    .complete_fetch(|this| {
                        this.inner.snapshot.send_modify(|snapshot| {
                            snapshot.phase = SessionPhase::Authenticated;
                            snapshot.user = Some(user.clone());
                            snapshot.error = false;
                        });
                        this.persist_marker(&user);
                    })
                    .await;
                if !committed {
                    return;
                }
                info!(user_id = %user.id, "signed in");
                self.resolve_addresses().await;
            }
            QueryOutcome::Failed => {
                warn!("signed-in user could not be loaded");
                self.complete_fetch(|this| {
                    this.inner.snapshot.send_modify(|snapshot| {
                        snapshot.phase = SessionPhase::Unauthenticated;
                        snapshot.error = true;
                    });
                })
                .await;
            }
            QueryOutcome::Disabled => {}
        }
    }

    /// Run a fetch completion unless the session was torn down while the
    /// fetch was in flight.
    ///
    /// Returns whether `commit` ran. Serializing on the logout guard keeps
    /// a concurrent logout's reset as the final state; the snapshot and the
    /// durable marker cannot resurface after their teardown.
    async fn complete_fetch(&self, commit: impl FnOnce(&Self)) -> bool {
        let _guard = self.inner.logout_guard.lock().await;
        if !self.inner.tokens.is_present() {
            debug!("fetch outcome discarded after logout");
            return false;
        }
        commit(self);
        true
    }

    /// The user's delivery addresses, fetched at most once per session.
    ///
    /// `None` until a token is held and the user marker exists.
    pub async fn addresses(&self) -> Option<Vec<Address>> {
        self.resolve_addresses().await.into_ready()
    }

    /// End the session at the user's request.
    ///
    /// Returns the landing route the shell must navigate to. By the time it
    /// returns, the token, user-scoped orders, UI selection, cached query
    /// results, and the durable user marker are all gone; the guest cart
    /// survives. Safe to call at any time.
    pub async fn logout(&self) -> &'static str {
        self.logout_with(LogoutReason::UserRequested).await
    }

    async fn logout_with(&self, reason: LogoutReason) -> &'static str {
        // Concurrent and forced re-entries line up here and then no-op.
        let _guard = self.inner.logout_guard.lock().await;

        if !self.inner.tokens.is_present() && self.snapshot().user.is_none() {
            debug!(%reason, "logout requested without an active session");
            return LANDING_ROUTE;
        }

        info!(%reason, "ending session");
        self.set_phase(SessionPhase::LoggingOut);

        self.inner.tokens.clear();
        self.inner.user_query.invalidate().await;
        self.inner.addresses_query.invalidate().await;
        self.inner.api.purge_cache();
        self.inner.cart.clear_user_orders();
        self.inner.selection.clear();
        if let Err(error) = self.inner.storage.remove(keys::USER) {
            warn!(%error, "user marker could not be removed");
        }

        self.inner.snapshot.send_replace(SessionSnapshot::default());
        LANDING_ROUTE
    }

    /// Drop cached remote data and load it again.
    ///
    /// The signed-in user's profile is kept; it stays valid for the whole
    /// session. Only the address book and the HTTP response cache are
    /// refetched.
    pub async fn refetch_remote_data(&self) {
        self.inner.api.purge_cache();
        self.inner.addresses_query.invalidate().await;
        self.resolve_addresses().await;
    }

    /// Watch the session snapshot. The receiver starts at the current
    /// value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// The current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Whether a loaded, error-free user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.snapshot.borrow().is_authenticated()
    }

    /// Whether an access token is held in memory.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner.tokens.is_present()
    }

    /// Who was signed in on this device, if anyone.
    ///
    /// Read from the durable marker, so it is available before (and
    /// without) a restore.
    #[must_use]
    pub fn remembered_user(&self) -> Option<UserMarker> {
        let bytes = self.inner.storage.get(keys::USER).ok().flatten()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn resolve_addresses(&self) -> QueryOutcome<Vec<Address>> {
        let Some(token) = self.inner.tokens.get() else {
            return QueryOutcome::Disabled;
        };

        let enabled = self.has_user_marker();
        let outcome = self
            .inner
            .addresses_query
            .resolve(enabled, || {
                let api = Arc::clone(&self.inner.api);
                let token = token.clone();
                async move { api.fetch_addresses(&token).await }
            })
            .await;

        if let QueryOutcome::Ready(addresses) = &outcome {
            // Skip the reconcile if the session ended mid-fetch.
            if self.inner.tokens.is_present() {
                self.inner.selection.reconcile_addresses(addresses);
            }
        }
        outcome
    }

    fn persist_marker(&self, user: &UserProfile) {
        let marker = UserMarker {
            id: user.id,
            email: user.email.clone(),
        };
        storage::persist_json(self.inner.storage.as_ref(), keys::USER, &marker);
    }

    fn has_user_marker(&self) -> bool {
        matches!(self.inner.storage.get(keys::USER), Ok(Some(_)))
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.inner.snapshot.send_modify(|snapshot| snapshot.phase = phase);
    }
}

impl Drop for CoordinatorInner {
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
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::api::ApiError;
    use crate::models::MenuItem;
    use crate::storage::MemoryStorage;
    use plateful_core::{
        AddressId, CurrencyCode, MenuItemId, Price, RestaurantId, UserRole,
    };

    struct StubApi {
        refresh_ok: bool,
        user_ok: bool,
        refresh_calls: AtomicU32,
        user_calls: AtomicU32,
        purges: AtomicU32,
    }

    impl StubApi {
        fn new(refresh_ok: bool, user_ok: bool) -> Arc<Self> {
            Arc::new(Self {
                refresh_ok,
                user_ok,
                refresh_calls: AtomicU32::new(0),
                user_calls: AtomicU32::new(0),
                purges: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteApi for StubApi {
        async fn refresh(&self) -> Result<AccessToken, ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_ok {
                Ok(AccessToken::new("stub-token"))
            } else {
                Err(ApiError::Unauthorized)
            }
        }

        async fn fetch_current_user(&self, _token: &AccessToken) -> Result<UserProfile, ApiError> {
            self.user_calls.fetch_add(1, Ordering::SeqCst);
            if self.user_ok {
                Ok(stub_user())
            } else {
                Err(ApiError::Unauthorized)
            }
        }

        async fn fetch_addresses(&self, _token: &AccessToken) -> Result<Vec<Address>, ApiError> {
            Ok(vec![stub_address()])
        }

        fn purge_cache(&self) {
            self.purges.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stub_user() -> UserProfile {
        UserProfile {
            id: UserId::new(7),
            name: "Stub User".to_owned(),
            email: Email::parse("stub@example.com").unwrap(),
            role: UserRole::Customer,
        }
    }

    fn stub_address() -> Address {
        Address {
            id: AddressId::new(1),
            label: "Home".to_owned(),
            line1: "1 Test Street".to_owned(),
            line2: None,
            city: "Springfield".to_owned(),
            postal_code: "12345".to_owned(),
            is_default: true,
        }
    }

    fn menu_item(id: i32) -> MenuItem {
        MenuItem {
            id: MenuItemId::new(id),
            restaurant_id: RestaurantId::new(1),
            name: format!("item-{id}"),
            description: None,
            price: Price::from_minor_units(500, CurrencyCode::USD),
            image_url: None,
        }
    }

    struct Harness {
        session: SessionCoordinator,
        storage: Arc<dyn StorageBackend>,
        bus: SessionBus,
        cart: CartStore,
        selection: SelectionStore,
    }

    fn harness(api: Arc<StubApi>) -> Harness {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let bus = SessionBus::new();
        let cart = CartStore::hydrate(Arc::clone(&storage));
        let selection = SelectionStore::hydrate(Arc::clone(&storage));
        let session = SessionCoordinator::new(
            api,
            Arc::clone(&storage),
            bus.clone(),
            cart.clone(),
            selection.clone(),
        );
        Harness {
            session,
            storage,
            bus,
            cart,
            selection,
        }
    }

    #[tokio::test]
    async fn test_restore_runs_at_most_once() {
        let api = StubApi::new(true, true);
        let h = harness(Arc::clone(&api));

        h.session.restore().await;
        h.session.restore().await;

        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Authenticated);
        assert!(snapshot.is_authenticated());
        assert_eq!(snapshot.user, Some(stub_user()));
    }

    #[tokio::test]
    async fn test_restore_is_skipped_with_a_token_in_memory() {
        let api = StubApi::new(true, true);
        let h = harness(Arc::clone(&api));

        h.session.complete_login(AccessToken::new("from-login")).await;
        h.session.restore().await;

        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
        assert!(h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_failure_is_silent() {
        let api = StubApi::new(false, true);
        let h = harness(Arc::clone(&api));

        h.session.restore().await;

        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
        assert!(!snapshot.error);
        assert!(snapshot.user.is_none());
        assert!(!h.session.has_token());
        assert_eq!(api.user_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_user_fetch_failure_surfaces_as_error_state() {
        let api = StubApi::new(true, false);
        let h = harness(Arc::clone(&api));

        h.session.restore().await;

        let snapshot = h.session.snapshot();
        assert!(snapshot.error);
        assert!(!snapshot.is_authenticated());
        assert!(snapshot.user.is_none());
        // The token itself is kept; only the profile load failed.
        assert!(h.session.has_token());
    }

    #[tokio::test]
    async fn test_successful_sign_in_writes_the_marker_and_addresses() {
        let api = StubApi::new(true, true);
        let h = harness(api);

        h.session.restore().await;

        let marker = h.session.remembered_user().unwrap();
        assert_eq!(marker.id, UserId::new(7));
        assert_eq!(marker.email.as_str(), "stub@example.com");

        assert_eq!(h.session.addresses().await, Some(vec![stub_address()]));
        assert_eq!(
            h.selection.selection().selected_address,
            Some(AddressId::new(1))
        );
    }

    #[tokio::test]
    async fn test_addresses_require_a_session() {
        let api = StubApi::new(false, true);
        let h = harness(api);

        h.session.restore().await;
        assert_eq!(h.session.addresses().await, None);
    }

    #[tokio::test]
    async fn test_logout_clears_user_scoped_state_but_not_the_guest_cart() {
        let api = StubApi::new(true, true);
        let h = harness(Arc::clone(&api));
        h.session.restore().await;

        h.cart.add_to_guest_cart(menu_item(1));
        h.cart.add_to_guest_cart(menu_item(2));
        h.cart.place_order(RestaurantId::new(1));
        h.cart.add_to_guest_cart(menu_item(3));
        h.cart.add_to_guest_cart(menu_item(4));

        let route = h.session.logout().await;

        assert_eq!(route, LANDING_ROUTE);
        assert!(!h.session.has_token());
        assert!(h.cart.orders().is_empty());
        assert_eq!(h.cart.guest_cart().len(), 2);
        assert_eq!(h.selection.selection(), crate::stores::Selection::default());
        assert!(h.session.remembered_user().is_none());
        assert!(h.storage.get(keys::USER).unwrap().is_none());
        assert_eq!(api.purges.load(Ordering::SeqCst), 1);
        assert_eq!(h.session.snapshot(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn test_logout_without_a_session_is_a_no_op() {
        let api = StubApi::new(false, true);
        let h = harness(Arc::clone(&api));

        assert_eq!(h.session.logout().await, LANDING_ROUTE);
        assert_eq!(api.purges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forced_logout_signal_ends_the_session() {
        let api = StubApi::new(true, true);
        let h = harness(api);
        h.session.start();
        h.session.restore().await;
        assert!(h.session.is_authenticated());

        let mut watcher = h.session.subscribe();
        h.bus.force_logout(LogoutReason::Unauthorized);

        tokio::time::timeout(
            Duration::from_secs(2),
            watcher.wait_for(|snapshot| snapshot.user.is_none()),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(!h.session.has_token());
        assert!(!h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_after_failed_fetch_retries_the_user() {
        let api = StubApi::new(true, false);
        let h = harness(Arc::clone(&api));

        h.session.restore().await;
        assert!(h.session.snapshot().error);
        assert_eq!(api.user_calls.load(Ordering::SeqCst), 1);

        // A fresh login invalidates the sticky failure and fetches again.
        h.session.complete_login(AccessToken::new("second")).await;
        assert_eq!(api.user_calls.load(Ordering::SeqCst), 2);
    }
}
