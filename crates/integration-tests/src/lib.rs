//! Test support for the Plateful client engine.
//!
//! Provides [`MockApi`], an in-process [`RemoteApi`] implementation with
//! scriptable outcomes and call counters, plus the fixtures and engine
//! builders the tests under `tests/` share.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p plateful-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_lifecycle` - restore, sign-in, and forced logout
//! - `logout_clearing` - what logout clears and what it keeps
//! - `cart_persistence` - cart/order durability across restarts
//! - `address_selection` - delivery address auto-selection
//! - `refresh_cooldown` - manual refresh throttling across instances
//! - `http_api` - the `reqwest` layer against a mock HTTP server

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use url::Url;

use plateful_client::api::{AccessToken, ApiError, RemoteApi};
use plateful_client::config::PlatefulConfig;
use plateful_client::models::{Address, MenuItem, UserProfile};
use plateful_client::session::SessionBus;
use plateful_client::state::Plateful;
use plateful_client::storage::StorageBackend;
use plateful_core::{
    AddressId, CurrencyCode, Email, MenuItemId, Price, RestaurantId, UserId, UserRole,
};

static TRACING: Once = Once::new();

/// Install a process-wide test subscriber. Safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("plateful_client=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Scriptable [`RemoteApi`] with call counters.
///
/// Defaults to a healthy backend: refresh succeeds, the sample user loads,
/// and one default address exists.
pub struct MockApi {
    refresh_ok: AtomicBool,
    user_ok: AtomicBool,
    user_network_failures: AtomicU32,
    addresses: Mutex<Vec<Address>>,
    refresh_calls: AtomicU32,
    user_calls: AtomicU32,
    address_calls: AtomicU32,
    purge_calls: AtomicU32,
}

impl MockApi {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            refresh_ok: AtomicBool::new(true),
            user_ok: AtomicBool::new(true),
            user_network_failures: AtomicU32::new(0),
            addresses: Mutex::new(vec![address(1, true)]),
            refresh_calls: AtomicU32::new(0),
            user_calls: AtomicU32::new(0),
            address_calls: AtomicU32::new(0),
            purge_calls: AtomicU32::new(0),
        })
    }

    /// Make `refresh` fail with `Unauthorized`, as for a signed-out visitor.
    pub fn deny_refresh(&self) {
        self.refresh_ok.store(false, Ordering::SeqCst);
    }

    /// Make `fetch_current_user` fail with `Unauthorized`.
    pub fn deny_user(&self) {
        self.user_ok.store(false, Ordering::SeqCst);
    }

    /// Make the next `times` user fetches fail with a transport error.
    pub fn fail_user_with_network(&self, times: u32) {
        self.user_network_failures.store(times, Ordering::SeqCst);
    }

    /// Replace the address book served to the engine.
    pub fn set_addresses(&self, addresses: Vec<Address>) {
        *self.addresses.lock().unwrap() = addresses;
    }

    #[must_use]
    pub fn refresh_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn user_count(&self) -> u32 {
        self.user_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn address_count(&self) -> u32 {
        self.address_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn purge_count(&self) -> u32 {
        self.purge_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApi for MockApi {
    async fn refresh(&self) -> Result<AccessToken, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.refresh_ok.load(Ordering::SeqCst) {
            Ok(AccessToken::new("mock-access-token"))
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    async fn fetch_current_user(&self, _token: &AccessToken) -> Result<UserProfile, ApiError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let inject_failure = self
            .user_network_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject_failure {
            return Err(network_error());
        }
        if self.user_ok.load(Ordering::SeqCst) {
            Ok(sample_user())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    async fn fetch_addresses(&self, _token: &AccessToken) -> Result<Vec<Address>, ApiError> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.addresses.lock().unwrap().clone())
    }

    fn purge_cache(&self) {
        self.purge_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A `reqwest` transport error minted without touching the network.
#[must_use]
pub fn network_error() -> ApiError {
    ApiError::Network(reqwest::Client::new().get("not a url").build().unwrap_err())
}

/// The user every healthy [`MockApi`] serves.
#[must_use]
pub fn sample_user() -> UserProfile {
    UserProfile {
        id: UserId::new(7),
        name: "Maya Okonkwo".to_owned(),
        email: Email::parse("maya@example.com").unwrap(),
        role: UserRole::Customer,
    }
}

/// A delivery address fixture.
#[must_use]
pub fn address(id: i32, is_default: bool) -> Address {
    Address {
        id: AddressId::new(id),
        label: format!("address-{id}"),
        line1: format!("{id} Mulberry Lane"),
        line2: None,
        city: "Springfield".to_owned(),
        postal_code: "62704".to_owned(),
        is_default,
    }
}

/// A menu item fixture priced in US dollars.
#[must_use]
pub fn menu_item(id: i32, restaurant: i32, minor_units: i64) -> MenuItem {
    MenuItem {
        id: MenuItemId::new(id),
        restaurant_id: RestaurantId::new(restaurant),
        name: format!("item-{id}"),
        description: None,
        price: Price::from_minor_units(minor_units, CurrencyCode::USD),
        image_url: None,
    }
}

/// Configuration pointing at a local test backend.
#[must_use]
pub fn test_config() -> PlatefulConfig {
    PlatefulConfig::new(Url::parse("http://localhost:8000/api").unwrap())
}

/// Assemble an engine over the given mock and storage backend.
#[must_use]
pub fn engine(api: Arc<MockApi>, storage: Arc<dyn StorageBackend>) -> Plateful {
    Plateful::new(test_config(), api, storage, SessionBus::new())
}
