//! Authentication state machine and watch-channel state stores.
//!
//! State is broadcast through `tokio::sync::watch`: readers borrow the
//! current snapshot without locks and subscribers observe transitions as
//! they land. One value is current at any time and it is the single source
//! of truth for whether protected operations may proceed.

use std::sync::Arc;
use tokio::sync::watch;

/// Authentication state machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// Session status not yet determined
    #[default]
    Initial,

    /// No authenticated user
    Unauthenticated,

    /// An authentication operation is in flight
    Loading,

    /// User is authenticated with valid credentials
    Authenticated {
        user_id: String,
        email: String,
        token: String,
    },

    /// Credentials or input were rejected; not retryable as-is
    Error { message: String },

    /// The remote authenticator was unreachable; retryable
    NetworkError { message: String },

    /// Login refused until the lockout window elapses
    AccountLocked {
        message: String,
        remaining: chrono::Duration,
    },
}

impl AuthState {
    /// Check if the state represents an authenticated user
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    /// Get the current access token if authenticated
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Get the current user id if authenticated
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { user_id, .. } => Some(user_id),
            _ => None,
        }
    }
}

/// Thread-safe snapshot store over a watch channel.
///
/// Cheap to clone; all clones share the same channel. Readers never block
/// writers and missed intermediate values are coalesced, so subscribers
/// always converge on the latest snapshot.
#[derive(Clone, Debug)]
pub struct StateCell<T> {
    sender: Arc<watch::Sender<T>>,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    /// Create a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        let (sender, receiver) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Clone of the current snapshot.
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Access the current snapshot without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.receiver.borrow())
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.receiver.clone()
    }

    /// Replace the snapshot, notifying subscribers.
    pub fn set(&self, value: T) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(value);
    }

    /// Mutate the snapshot in place, notifying subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.sender.send_modify(f);
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Authentication state store shared by the session manager and the
/// fallback authenticators.
#[derive(Clone, Debug)]
pub struct AuthStateStore {
    cell: StateCell<AuthState>,
}

impl AuthStateStore {
    /// Create a store starting at [`AuthState::Unauthenticated`].
    pub fn new() -> Self {
        Self {
            cell: StateCell::new(AuthState::Unauthenticated),
        }
    }

    /// Get the current auth state
    pub fn current(&self) -> AuthState {
        self.cell.current()
    }

    /// Check if authenticated without cloning
    pub fn is_authenticated(&self) -> bool {
        self.cell.with(AuthState::is_authenticated)
    }

    /// Access state without cloning
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AuthState) -> R,
    {
        self.cell.with(f)
    }

    /// Subscribe to auth state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.cell.subscribe()
    }

    /// Update the auth state
    pub fn set(&self, state: AuthState) {
        self.cell.set(state);
    }

    /// Transition to authenticated state
    pub fn authenticate(&self, user_id: String, email: String, token: String) {
        self.set(AuthState::Authenticated {
            user_id,
            email,
            token,
        });
    }

    /// Log out the current user
    pub fn logout(&self) {
        self.set(AuthState::Unauthenticated);
    }
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}
