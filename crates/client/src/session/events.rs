//! Process-wide session signals.
//!
//! Collaborators that observe an invalid session (notably the HTTP layer on
//! a 401 response) signal it here without holding a coordinator reference.
//! The coordinator subscribes one listener for its lifetime.

use tokio::sync::broadcast;

const SIGNAL_CHANNEL_CAPACITY: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to sign out.
    UserRequested,
    /// The remote system rejected the session's credentials.
    Unauthorized,
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserRequested => write!(f, "user_requested"),
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// A session lifecycle signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The current session must end.
    ForceLogout {
        /// What prompted the forced logout.
        reason: LogoutReason,
    },
}

/// Broadcasts [`SessionSignal`]s to all subscribers.
///
/// Cheaply cloneable; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionSignal>,
}

impl SessionBus {
    /// Create a bus with no subscribers yet.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Signal that the session must end.
    pub fn force_logout(&self, reason: LogoutReason) {
        // No subscribers is a valid state; the send result is irrelevant.
        let _ = self.tx.send(SessionSignal::ForceLogout { reason });
    }

    /// Subscribe to all session signals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.tx.subscribe()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}
