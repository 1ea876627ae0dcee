//! Offline PIN fallback: local session restore without a remote round-trip.
//!
//! Enrollment is only allowed while online (a PIN fallback must be
//! established under a trusted, connected context); verification is a local
//! hash-compare against the stored digest and, on success, reinstalls the
//! previously persisted session through the session manager.

use std::sync::Arc;

use log::debug;

use clavex_core::credentials::{CredentialKey, flag, parse_flag};
use clavex_core::error::{AuthError, AuthResult};
use clavex_core::pin::{PinError, hash_pin, validate_pin};
use clavex_core::ports::{ConnectivityProbe, CredentialStore};
use clavex_core::secret::Secret;

use crate::manager::SessionManager;
use crate::state::StateCell;

/// Snapshot of the offline PIN flow, broadcast to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfflinePinState {
    pub is_enabled: bool,
    pub is_pin_set: bool,
    pub requires_pin_entry: bool,
    pub is_offline: bool,
    pub is_verifying: bool,
    pub error: Option<String>,
}

/// Enrolls and verifies the 6-digit offline PIN.
pub struct OfflinePinAuthenticator {
    store: Arc<dyn CredentialStore>,
    probe: Arc<dyn ConnectivityProbe>,
    sessions: SessionManager,
    state: StateCell<OfflinePinState>,
}

impl OfflinePinAuthenticator {
    /// Authenticator over the given store, connectivity probe, and session
    /// manager.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        probe: Arc<dyn ConnectivityProbe>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            store,
            probe,
            sessions,
            state: StateCell::default(),
        }
    }

    /// The snapshot store, for reads and subscriptions.
    pub fn state(&self) -> &StateCell<OfflinePinState> {
        &self.state
    }

    /// Enable the offline PIN fallback.
    ///
    /// Refused while offline: enrollment must happen in a connected context.
    pub async fn enable_offline_pin(&self) -> AuthResult<()> {
        if !self.probe.is_online() {
            let err = PinError::EnrollmentRequiresNetwork;
            self.state.update(|s| s.error = Some(err.to_string()));
            return Err(err.into());
        }

        self.store
            .put(CredentialKey::OfflinePinEnabled, flag(true))
            .await?;
        self.state.update(|s| {
            s.is_enabled = true;
            s.error = None;
        });
        Ok(())
    }

    /// Set the PIN, persisting only its one-way hash.
    ///
    /// Invalid input fails locally without touching storage.
    pub async fn set_pin(&self, pin: Secret) -> AuthResult<()> {
        if let Err(err) = validate_pin(pin.expose()) {
            self.state.update(|s| s.error = Some(err.to_string()));
            return Err(err.into());
        }

        let digest = hash_pin(pin.expose());
        self.store
            .put(CredentialKey::OfflinePinHash, &digest)
            .await?;
        self.state.update(|s| {
            s.is_pin_set = true;
            s.error = None;
        });
        Ok(())
    }

    /// Decide whether the PIN entry flow is required right now.
    ///
    /// Run once at application start: offline with an enabled PIN and a
    /// stored hash means the PIN screen gates entry; otherwise the snapshot
    /// just reflects enablement and connectivity.
    pub async fn check_offline_auth_required(&self) -> OfflinePinState {
        let is_offline = !self.probe.is_online();
        let is_enabled = parse_flag(
            self.read_or_none(CredentialKey::OfflinePinEnabled)
                .await
                .as_deref(),
        );
        let is_pin_set = self
            .read_or_none(CredentialKey::OfflinePinHash)
            .await
            .is_some();

        let snapshot = OfflinePinState {
            is_enabled,
            is_pin_set,
            requires_pin_entry: is_offline && is_enabled && is_pin_set,
            is_offline,
            is_verifying: false,
            error: None,
        };
        self.state.set(snapshot.clone());
        snapshot
    }

    /// Verify a PIN and restore the stored session on a match.
    ///
    /// A mismatch leaves `requires_pin_entry` untouched: entry is still
    /// pending and the user may retry.
    pub async fn verify_pin(&self, pin: Secret) -> AuthResult<()> {
        self.state.update(|s| {
            s.is_verifying = true;
            s.error = None;
        });

        let stored = match self.store.get(CredentialKey::OfflinePinHash).await {
            Ok(value) => value,
            Err(err) => {
                self.state.update(|s| {
                    s.is_verifying = false;
                    s.error = Some(err.to_string());
                });
                return Err(err.into());
            }
        };
        let Some(stored) = stored else {
            let err = PinError::NotSet;
            self.state.update(|s| {
                s.is_verifying = false;
                s.error = Some(err.to_string());
            });
            return Err(err.into());
        };

        if hash_pin(pin.expose()) != stored {
            let err = PinError::Incorrect;
            self.state.update(|s| {
                s.is_verifying = false;
                s.error = Some(err.to_string());
            });
            return Err(err.into());
        }

        let token = self.read_or_none(CredentialKey::AuthToken).await;
        let user_id = self.read_or_none(CredentialKey::UserId).await;
        let email = self.read_or_none(CredentialKey::UserEmail).await;
        let (Some(token), Some(user_id), Some(email)) = (token, user_id, email) else {
            let err = AuthError::NoStoredSession;
            self.state.update(|s| {
                s.is_verifying = false;
                s.error = Some(err.to_string());
            });
            return Err(err);
        };

        self.sessions.restore_session(user_id, email, token).await;
        self.state.update(|s| {
            s.requires_pin_entry = false;
            s.is_verifying = false;
            s.error = None;
        });
        Ok(())
    }

    /// Remove the PIN fallback entirely: flag, hash, and local state.
    pub async fn disable_offline_pin(&self) -> AuthResult<()> {
        self.store.delete(CredentialKey::OfflinePinEnabled).await?;
        self.store.delete(CredentialKey::OfflinePinHash).await?;
        self.state.set(OfflinePinState::default());
        Ok(())
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
}

impl std::fmt::Debug for OfflinePinAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflinePinAuthenticator")
            .field("state", &self.state.current())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AuthState;
    use clavex_core::store::MemoryCredentialStore;
    use clavex_core::stub::StubAuthenticator;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeProbe {
        online: AtomicBool,
    }

    impl FakeProbe {
        fn new(online: bool) -> Self {
            Self {
                online: AtomicBool::new(online),
            }
        }

        fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    impl ConnectivityProbe for FakeProbe {
        fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }
    }

    fn fixture(
        store: Arc<MemoryCredentialStore>,
        online: bool,
    ) -> (Arc<FakeProbe>, SessionManager, OfflinePinAuthenticator) {
        let probe = Arc::new(FakeProbe::new(online));
        let sessions = SessionManager::new(store.clone(), Arc::new(StubAuthenticator::default()));
        let pin = OfflinePinAuthenticator::new(store, probe.clone(), sessions.clone());
        (probe, sessions, pin)
    }

    #[tokio::test]
    async fn enable_fails_offline_and_succeeds_online() {
        let store = Arc::new(MemoryCredentialStore::new());
        let (probe, _sessions, pin) = fixture(store.clone(), false);

        let err = pin.enable_offline_pin().await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Pin(PinError::EnrollmentRequiresNetwork)
        ));
        assert_eq!(
            pin.state().current().error.as_deref(),
            Some("Cannot enable PIN while offline")
        );
        assert_eq!(store.get(CredentialKey::OfflinePinEnabled).await.unwrap(), None);

        probe.set_online(true);
        pin.enable_offline_pin().await.unwrap();
        assert!(pin.state().current().is_enabled);
        assert_eq!(
            store
                .get(CredentialKey::OfflinePinEnabled)
                .await
                .unwrap()
                .as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn set_pin_validates_before_storing() {
        let store = Arc::new(MemoryCredentialStore::new());
        let (_probe, _sessions, pin) = fixture(store.clone(), true);

        assert!(pin.set_pin("12345".into()).await.is_err());
        assert!(pin.set_pin("abcdef".into()).await.is_err());
        assert_eq!(store.get(CredentialKey::OfflinePinHash).await.unwrap(), None);
        assert!(!pin.state().current().is_pin_set);

        pin.set_pin("123456".into()).await.unwrap();
        assert!(pin.state().current().is_pin_set);
        let stored = store
            .get(CredentialKey::OfflinePinHash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, hash_pin("123456"));
    }

    #[tokio::test]
    async fn offline_with_enabled_pin_requires_entry() {
        let store = Arc::new(MemoryCredentialStore::with_entries(&[
            (CredentialKey::OfflinePinEnabled, "true"),
        ]));
        store
            .put(CredentialKey::OfflinePinHash, &hash_pin("123456"))
            .await
            .unwrap();
        let (_probe, _sessions, pin) = fixture(store, false);

        let snapshot = pin.check_offline_auth_required().await;
        assert!(snapshot.requires_pin_entry);
        assert!(snapshot.is_offline);
        assert!(snapshot.is_enabled);
        assert!(snapshot.is_pin_set);
    }

    #[tokio::test]
    async fn online_or_unenrolled_does_not_require_entry() {
        // Online with full enrollment.
        let store = Arc::new(MemoryCredentialStore::with_entries(&[(
            CredentialKey::OfflinePinEnabled,
            "true",
        )]));
        store
            .put(CredentialKey::OfflinePinHash, &hash_pin("123456"))
            .await
            .unwrap();
        let (_probe, _sessions, pin) = fixture(store, true);
        let snapshot = pin.check_offline_auth_required().await;
        assert!(!snapshot.requires_pin_entry);
        assert!(!snapshot.is_offline);

        // Offline but never enrolled.
        let store = Arc::new(MemoryCredentialStore::new());
        let (_probe, _sessions, pin) = fixture(store, false);
        let snapshot = pin.check_offline_auth_required().await;
        assert!(!snapshot.requires_pin_entry);
        assert!(snapshot.is_offline);
        assert!(!snapshot.is_enabled);
    }

    #[tokio::test]
    async fn verify_pin_restores_the_stored_session() {
        let store = Arc::new(MemoryCredentialStore::with_entries(&[
            (CredentialKey::AuthToken, "tok"),
            (CredentialKey::UserId, "user_1"),
            (CredentialKey::UserEmail, "a@b.com"),
        ]));
        store
            .put(CredentialKey::OfflinePinHash, &hash_pin("123456"))
            .await
            .unwrap();
        let (_probe, sessions, pin) = fixture(store, false);

        pin.verify_pin("123456".into()).await.unwrap();
        assert_eq!(
            sessions.state().current(),
            AuthState::Authenticated {
                user_id: "user_1".to_string(),
                email: "a@b.com".to_string(),
                token: "tok".to_string(),
            }
        );
        let snapshot = pin.state().current();
        assert!(!snapshot.requires_pin_entry);
        assert!(!snapshot.is_verifying);
        assert_eq!(snapshot.error, None);
    }

    #[tokio::test]
    async fn incorrect_pin_leaves_entry_pending() {
        let store = Arc::new(MemoryCredentialStore::with_entries(&[
            (CredentialKey::AuthToken, "tok"),
            (CredentialKey::UserId, "user_1"),
            (CredentialKey::UserEmail, "a@b.com"),
            (CredentialKey::OfflinePinEnabled, "true"),
        ]));
        store
            .put(CredentialKey::OfflinePinHash, &hash_pin("123456"))
            .await
            .unwrap();
        let (_probe, sessions, pin) = fixture(store, false);
        pin.check_offline_auth_required().await;
        assert!(pin.state().current().requires_pin_entry);

        let err = pin.verify_pin("654321".into()).await.unwrap_err();
        assert!(matches!(err, AuthError::Pin(PinError::Incorrect)));
        let snapshot = pin.state().current();
        assert_eq!(snapshot.error.as_deref(), Some("Incorrect PIN"));
        assert!(snapshot.requires_pin_entry);
        assert!(!snapshot.is_verifying);
        assert!(!sessions.state().is_authenticated());
    }

    #[tokio::test]
    async fn verify_without_stored_pin_fails() {
        let store = Arc::new(MemoryCredentialStore::new());
        let (_probe, _sessions, pin) = fixture(store, false);

        let err = pin.verify_pin("123456".into()).await.unwrap_err();
        assert!(matches!(err, AuthError::Pin(PinError::NotSet)));
        assert_eq!(pin.state().current().error.as_deref(), Some("No PIN set"));
    }

    #[tokio::test]
    async fn verify_with_no_stored_session_fails_closed() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .put(CredentialKey::OfflinePinHash, &hash_pin("123456"))
            .await
            .unwrap();
        let (_probe, sessions, pin) = fixture(store, false);

        let err = pin.verify_pin("123456".into()).await.unwrap_err();
        assert!(matches!(err, AuthError::NoStoredSession));
        assert!(!sessions.state().is_authenticated());
    }

    #[tokio::test]
    async fn disable_clears_flag_hash_and_state() {
        let store = Arc::new(MemoryCredentialStore::with_entries(&[(
            CredentialKey::OfflinePinEnabled,
            "true",
        )]));
        store
            .put(CredentialKey::OfflinePinHash, &hash_pin("123456"))
            .await
            .unwrap();
        let (_probe, _sessions, pin) = fixture(store.clone(), true);
        pin.check_offline_auth_required().await;

        pin.disable_offline_pin().await.unwrap();
        assert_eq!(store.get(CredentialKey::OfflinePinEnabled).await.unwrap(), None);
        assert_eq!(store.get(CredentialKey::OfflinePinHash).await.unwrap(), None);
        assert_eq!(pin.state().current(), OfflinePinState::default());
    }
}
