//! Session manager: the central authentication state machine.
//!
//! Owns login/logout/registration and the failed-attempt lockout policy,
//! classifies remote failures (network vs rejection), persists credentials
//! through the store port, and broadcasts every transition through the
//! [`AuthStateStore`]. The offline PIN and biometric authenticators install
//! restored sessions through [`SessionManager::restore_session`].

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::Mutex;

use clavex_core::credentials::{CredentialKey, encode_timestamp};
use clavex_core::error::{AuthError, AuthResult};
use clavex_core::lockout::{LockoutPolicy, LockoutTracker};
use clavex_core::ports::{CredentialStore, RemoteAuthError, RemoteAuthenticator, RemoteSession};
use clavex_core::secret::Secret;

use crate::state::{AuthState, AuthStateStore};

const LOCKED_MESSAGE: &str =
    "Account temporarily locked due to multiple failed authentication attempts";
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
const MISSING_FIELDS_MESSAGE: &str = "Please fill in all fields";
const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed";

/// Authentication session manager.
///
/// Cheap to clone; clones share the state store, the lockout counters, and
/// the operation lock. Mutating operations are serialized through that lock:
/// a login issued while another is in flight waits for it instead of
/// interleaving lockout-counter updates or leaving the state machine in a
/// transient value.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    remote: Arc<dyn RemoteAuthenticator>,
    state: AuthStateStore,
    policy: LockoutPolicy,
    lockout: Arc<Mutex<LockoutTracker>>,
    op_lock: Arc<Mutex<()>>,
}

impl SessionManager {
    /// Manager over the given store and remote authenticator, with the
    /// default lockout policy (5 attempts, 5-minute window).
    pub fn new(store: Arc<dyn CredentialStore>, remote: Arc<dyn RemoteAuthenticator>) -> Self {
        Self {
            store,
            remote,
            state: AuthStateStore::new(),
            policy: LockoutPolicy::default(),
            lockout: Arc::new(Mutex::new(LockoutTracker::new())),
            op_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Override the lockout policy.
    #[must_use]
    pub fn with_lockout_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The state store, for reads and subscriptions.
    pub fn state(&self) -> &AuthStateStore {
        &self.state
    }

    /// The credential store this manager persists through.
    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Authenticate with email and password.
    ///
    /// An active lockout short-circuits before any remote contact. Network
    /// failures leave the attempt counter untouched and are retryable;
    /// rejections count toward the lockout threshold.
    pub async fn login(&self, email: &str, password: Secret) -> AuthResult<()> {
        let _op = self.op_lock.lock().await;
        let now = Utc::now();

        {
            let mut lockout = self.lockout.lock().await;
            lockout.clear_if_expired(now);
            if let Some(remaining) = lockout.remaining(now) {
                self.state.set(AuthState::AccountLocked {
                    message: LOCKED_MESSAGE.to_string(),
                    remaining,
                });
                return Err(AuthError::AccountLocked { remaining });
            }
        }

        self.state.set(AuthState::Loading);
        match self.remote.login(email, password.expose()).await {
            Ok(session) => {
                self.lockout.lock().await.reset();
                self.persist_session(&session, email).await;
                self.state
                    .authenticate(session.user_id, email.to_string(), session.token);
                Ok(())
            }
            Err(RemoteAuthError::Unreachable(message)) => {
                self.state.set(AuthState::NetworkError {
                    message: message.clone(),
                });
                Err(AuthError::Network(message))
            }
            Err(RemoteAuthError::Rejected) => {
                let now = Utc::now();
                let remaining = self
                    .lockout
                    .lock()
                    .await
                    .record_failure(now, &self.policy);
                match remaining {
                    Some(remaining) => {
                        self.state.set(AuthState::AccountLocked {
                            message: LOCKED_MESSAGE.to_string(),
                            remaining,
                        });
                        Err(AuthError::AccountLocked { remaining })
                    }
                    None => {
                        self.state.set(AuthState::Error {
                            message: INVALID_CREDENTIALS_MESSAGE.to_string(),
                        });
                        Err(AuthError::InvalidCredentials)
                    }
                }
            }
        }
    }

    /// Register a new identity.
    ///
    /// Same shape as [`login`](Self::login) but with no lockout
    /// interaction; missing fields fail locally without remote contact.
    pub async fn register(&self, name: &str, email: &str, password: Secret) -> AuthResult<()> {
        let _op = self.op_lock.lock().await;

        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            self.state.set(AuthState::Error {
                message: MISSING_FIELDS_MESSAGE.to_string(),
            });
            return Err(AuthError::Validation(MISSING_FIELDS_MESSAGE.to_string()));
        }

        self.state.set(AuthState::Loading);
        match self.remote.register(name, email, password.expose()).await {
            Ok(session) => {
                self.persist_session(&session, email).await;
                self.state
                    .authenticate(session.user_id, email.to_string(), session.token);
                Ok(())
            }
            Err(RemoteAuthError::Unreachable(message)) => {
                self.state.set(AuthState::NetworkError {
                    message: message.clone(),
                });
                Err(AuthError::Network(message))
            }
            Err(RemoteAuthError::Rejected) => {
                self.state.set(AuthState::Error {
                    message: REGISTRATION_FAILED_MESSAGE.to_string(),
                });
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Resolve the persisted session, if any.
    ///
    /// Any storage read error is treated as "no session": the machine lands
    /// in `Unauthenticated`, never in a trusted state it cannot prove.
    pub async fn check_auth_status(&self) {
        let _op = self.op_lock.lock().await;
        self.state.set(AuthState::Loading);

        let token = self.read_or_none(CredentialKey::AuthToken).await;
        let user_id = self.read_or_none(CredentialKey::UserId).await;
        let email = self.read_or_none(CredentialKey::UserEmail).await;

        match (token, user_id, email) {
            (Some(token), Some(user_id), Some(email)) => {
                self.state.authenticate(user_id, email, token);
            }
            _ => self.state.set(AuthState::Unauthenticated),
        }
    }

    /// Install a previously persisted session without a remote round-trip.
    ///
    /// Bypasses the remote authenticator and the lockout check. This is the
    /// integration point the offline PIN and biometric authenticators call
    /// after a successful local verification.
    pub async fn restore_session(&self, user_id: String, email: String, token: String) {
        let _op = self.op_lock.lock().await;
        self.state.authenticate(user_id, email, token);
    }

    /// Clear the persisted session and return to `Unauthenticated`.
    ///
    /// Idempotent; storage failures are logged and do not keep the user
    /// signed in.
    pub async fn logout(&self) {
        let _op = self.op_lock.lock().await;
        for key in [
            CredentialKey::AuthToken,
            CredentialKey::UserId,
            CredentialKey::UserEmail,
        ] {
            if let Err(err) = self.store.delete(key).await {
                warn!("Failed to delete {key} during logout: {err}");
            }
        }
        self.state.logout();
    }

    async fn read_or_none(&self, key: CredentialKey) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(err) => {
                debug!("Treating unreadable {key} as absent: {err}");
                None
            }
        }
    }

    /// Persist a freshly minted session as one logical update.
    ///
    /// The access token is written last: its presence is the commit signal
    /// for readers. A storage failure costs restart persistence only, so it
    /// is logged rather than failing the login.
    async fn persist_session(&self, session: &RemoteSession, email: &str) {
        let mut entries = vec![
            (CredentialKey::UserEmail, email.to_string()),
            (CredentialKey::UserId, session.user_id.clone()),
        ];
        if let Some(refresh_token) = &session.refresh_token {
            entries.push((CredentialKey::RefreshToken, refresh_token.clone()));
        }
        if let Some(expires_at) = session.expires_at {
            entries.push((CredentialKey::TokenExpiration, encode_timestamp(expires_at)));
        }
        entries.push((CredentialKey::AuthToken, session.token.clone()));

        if let Err(err) = self.store.put_many(&entries).await {
            warn!("Failed to persist session credentials: {err}");
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state.current())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
