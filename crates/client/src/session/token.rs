//! In-memory access token store.

use std::sync::{Mutex, PoisonError};

use crate::api::AccessToken;

/// Holds the current access token in volatile memory.
///
/// The token is either absent or was issued by a successful refresh/login.
/// It is never written to durable storage; it lives only as long as the
/// process. The session coordinator is the only writer.
#[derive(Debug, Default)]
pub struct TokenStore {
    token: Mutex<Option<AccessToken>>,
}

impl TokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly issued token.
    pub fn set(&self, token: AccessToken) {
        *self.lock() = Some(token);
    }

    /// Drop the current token.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// The current token, if any.
    #[must_use]
    pub fn get(&self) -> Option<AccessToken> {
        self.lock().clone()
    }

    /// Whether a token is currently held.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<AccessToken>> {
        // A poisoned Option<AccessToken> is still a usable value.
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let store = TokenStore::new();
        assert!(!store.is_present());
        assert!(store.get().is_none());
    }

    #[test]
    fn test_set_then_clear() {
        let store = TokenStore::new();

        store.set(AccessToken::new("tok-1"));
        assert!(store.is_present());
        assert_eq!(store.get().unwrap().expose_secret(), "tok-1");

        store.clear();
        assert!(!store.is_present());
    }

    #[test]
    fn test_set_replaces_previous_token() {
        let store = TokenStore::new();
        store.set(AccessToken::new("tok-1"));
        store.set(AccessToken::new("tok-2"));
        assert_eq!(store.get().unwrap().expose_secret(), "tok-2");
    }
}
