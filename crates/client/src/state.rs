//! Application state shared across the app shell.

use std::sync::Arc;

use crate::api::{ApiError, HttpApi, RemoteApi};
use crate::config::PlatefulConfig;
use crate::session::{SessionBus, SessionCoordinator};
use crate::storage::{FileStorage, StorageBackend, StorageError};
use crate::stores::{CartStore, RefreshGate, SelectionStore};

/// Error assembling the engine from configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("http client could not be built: {0}")]
    Http(#[from] ApiError),
}

/// The assembled client engine.
///
/// This struct is cheaply cloneable via `Arc` and hands the shell its
/// session coordinator, stores, and refresh gate, all wired over one
/// storage backend and one session bus.
#[derive(Clone)]
pub struct Plateful {
    inner: Arc<PlatefulInner>,
}

struct PlatefulInner {
    config: PlatefulConfig,
    storage: Arc<dyn StorageBackend>,
    bus: SessionBus,
    session: SessionCoordinator,
    cart: CartStore,
    selection: SelectionStore,
    refresh_gate: RefreshGate,
}

impl Plateful {
    /// Assemble the engine over explicit collaborators.
    ///
    /// Stores hydrate from `storage` immediately; nothing talks to the
    /// network until [`Self::start`].
    #[must_use]
    pub fn new(
        config: PlatefulConfig,
        api: Arc<dyn RemoteApi>,
        storage: Arc<dyn StorageBackend>,
        bus: SessionBus,
    ) -> Self {
        let cart = CartStore::hydrate(Arc::clone(&storage));
        let selection = SelectionStore::hydrate(Arc::clone(&storage));
        let refresh_gate = RefreshGate::hydrate(Arc::clone(&storage), config.refresh_cooldown);
        let session = SessionCoordinator::new(
            api,
            Arc::clone(&storage),
            bus.clone(),
            cart.clone(),
            selection.clone(),
        );

        Self {
            inner: Arc::new(PlatefulInner {
                config,
                storage,
                bus,
                session,
                cart,
                selection,
                refresh_gate,
            }),
        }
    }

    /// Assemble the production engine: file-backed storage under the
    /// configured data directory and the HTTP remote layer.
    ///
    /// # Errors
    ///
    /// Returns an error when the data directory cannot be created or the
    /// HTTP client cannot be built.
    pub fn from_config(config: PlatefulConfig) -> Result<Self, SetupError> {
        let storage: Arc<dyn StorageBackend> = Arc::new(FileStorage::open(&config.data_dir)?);
        let bus = SessionBus::new();
        let api: Arc<dyn RemoteApi> = Arc::new(HttpApi::new(&config, bus.clone())?);
        Ok(Self::new(config, api, storage, bus))
    }

    /// Bring the engine online: subscribe the background listeners and
    /// attempt the one-time session restore.
    pub async fn start(&self) {
        self.inner.session.start();
        self.inner.refresh_gate.start();
        self.inner.session.restore().await;
    }

    /// User-initiated refresh of remote data, subject to the cooldown.
    ///
    /// Returns whether the refetch actually ran.
    pub async fn trigger_refresh(&self) -> bool {
        self.inner
            .refresh_gate
            .trigger(|| self.inner.session.refetch_remote_data())
            .await
    }

    /// Get a reference to the engine configuration.
    #[must_use]
    pub fn config(&self) -> &PlatefulConfig {
        &self.inner.config
    }

    /// Get a reference to the session coordinator.
    #[must_use]
    pub fn session(&self) -> &SessionCoordinator {
        &self.inner.session
    }

    /// Get a reference to the cart/order store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the UI selection store.
    #[must_use]
    pub fn selection(&self) -> &SelectionStore {
        &self.inner.selection
    }

    /// Get a reference to the manual-refresh gate.
    #[must_use]
    pub fn refresh_gate(&self) -> &RefreshGate {
        &self.inner.refresh_gate
    }

    /// Get a reference to the session signal bus.
    #[must_use]
    pub fn bus(&self) -> &SessionBus {
        &self.inner.bus
    }

    /// Get a reference to the durable storage backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.inner.storage
    }
}
