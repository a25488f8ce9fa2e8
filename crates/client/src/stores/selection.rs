//! UI selection state: the restaurant being viewed and the delivery
//! address chosen for checkout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use plateful_core::{AddressId, RestaurantId};

use crate::models::Address;
use crate::storage::{self, StorageBackend, keys};

/// What the user currently has selected in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// The restaurant whose menu is on screen.
    #[serde(default)]
    pub viewed_restaurant: Option<RestaurantId>,
    /// The delivery address picked for checkout.
    #[serde(default)]
    pub selected_address: Option<AddressId>,
}

/// Store for [`Selection`], persisted after every change.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct SelectionStore {
    inner: Arc<SelectionStoreInner>,
}

struct SelectionStoreInner {
    storage: Arc<dyn StorageBackend>,
    state: Mutex<Selection>,
}

impl SelectionStore {
    /// Load the store from durable storage, falling back to an empty
    /// selection on absent or malformed data.
    #[must_use]
    pub fn hydrate(backend: Arc<dyn StorageBackend>) -> Self {
        let state: Selection = storage::load_or_default(backend.as_ref(), keys::SELECTION);
        Self {
            inner: Arc::new(SelectionStoreInner {
                storage: backend,
                state: Mutex::new(state),
            }),
        }
    }

    /// Record the restaurant the user is browsing.
    pub fn view_restaurant(&self, restaurant_id: RestaurantId) {
        self.mutate(|state| state.viewed_restaurant = Some(restaurant_id));
    }

    /// Record an explicit address choice.
    pub fn select_address(&self, address_id: AddressId) {
        self.mutate(|state| state.selected_address = Some(address_id));
    }

    /// Reconcile the address selection against a freshly fetched list.
    ///
    /// A selection still present in the list is kept. Otherwise the default
    /// address is picked, then the first one, then nothing. Runs whenever
    /// the address book changes upstream so checkout never points at an
    /// address the user deleted from another device.
    pub fn reconcile_addresses(&self, addresses: &[Address]) {
        self.mutate(|state| {
            let still_valid = state
                .selected_address
                .is_some_and(|id| addresses.iter().any(|a| a.id == id));
            if still_valid {
                return;
            }

            let fallback = addresses
                .iter()
                .find(|a| a.is_default)
                .or_else(|| addresses.first())
                .map(|a| a.id);
            if state.selected_address != fallback {
                debug!(?fallback, "address selection reconciled");
            }
            state.selected_address = fallback;
        });
    }

    /// Reset the selection. Called on logout.
    pub fn clear(&self) {
        self.mutate(|state| *state = Selection::default());
    }

    /// Snapshot of the current selection.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.lock().clone()
    }

    fn mutate<R>(&self, apply: impl FnOnce(&mut Selection) -> R) -> R {
        let mut state = self.lock();
        let result = apply(&mut state);
        storage::persist_json(self.inner.storage.as_ref(), keys::SELECTION, &*state);
        result
    }

    fn lock(&self) -> MutexGuard<'_, Selection> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
