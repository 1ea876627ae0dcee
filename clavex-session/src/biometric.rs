//! Biometric session restore, delegated to platform hardware.
//!
//! Capability probing is fail-closed: any probe error, missing capability,
//! or empty enrollment collapses to `Unavailable`. The persisted enabled
//! flag is independent of hardware capability; callers must check both.

use std::sync::Arc;

use log::debug;

use clavex_core::credentials::{CredentialKey, flag, parse_flag};
use clavex_core::error::{AuthError, AuthResult};
use clavex_core::ports::{BiometricPlatform, BiometricPromptOptions, CredentialStore};

use crate::manager::SessionManager;
use crate::state::StateCell;

const PROMPT_REASON: &str = "Authenticate to access your account";
const PROMPT_DECLINED_MESSAGE: &str = "Biometric authentication failed";

/// Biometric flow state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BiometricState {
    #[default]
    Initial,
    Checking,
    Available,
    Unavailable,
    Authenticating,
    Authenticated,
    Failed {
        message: String,
    },
}

/// Restores a previously persisted session behind the platform biometric
/// prompt.
pub struct BiometricAuthenticator {
    platform: Arc<dyn BiometricPlatform>,
    store: Arc<dyn CredentialStore>,
    sessions: SessionManager,
    state: StateCell<BiometricState>,
}

impl BiometricAuthenticator {
    /// Authenticator over the given platform, store, and session manager.
    pub fn new(
        platform: Arc<dyn BiometricPlatform>,
        store: Arc<dyn CredentialStore>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            platform,
            store,
            sessions,
            state: StateCell::default(),
        }
    }

    /// The state store, for reads and subscriptions.
    pub fn state(&self) -> &StateCell<BiometricState> {
        &self.state
    }

    /// Probe hardware capability and enrollment.
    ///
    /// Never assumes availability on error: every failure path lands in
    /// `Unavailable`.
    pub async fn can_use_biometrics(&self) -> bool {
        self.state.set(BiometricState::Checking);

        let available = async {
            let can_check = self.platform.can_check_biometrics().await?;
            let supported = self.platform.is_device_supported().await?;
            let enrolled = self.platform.available_biometrics().await?;
            Ok::<bool, clavex_core::ports::BiometricPlatformError>(
                can_check && supported && !enrolled.is_empty(),
            )
        }
        .await;

        match available {
            Ok(true) => {
                self.state.set(BiometricState::Available);
                true
            }
            Ok(false) => {
                self.state.set(BiometricState::Unavailable);
                false
            }
            Err(err) => {
                debug!("Biometric capability probe failed: {err}");
                self.state.set(BiometricState::Unavailable);
                false
            }
        }
    }

    /// Whether the user has opted into biometric unlock on this device.
    ///
    /// Purely the persisted flag; hardware may still be unavailable.
    pub async fn is_biometric_enabled(&self) -> bool {
        match self.store.get(CredentialKey::BiometricEnabled).await {
            Ok(value) => parse_flag(value.as_deref()),
            Err(err) => {
                debug!("Treating unreadable biometric flag as disabled: {err}");
                false
            }
        }
    }

    /// Persist the opt-in flag.
    pub async fn enable_biometric(&self) -> AuthResult<()> {
        self.store
            .put(CredentialKey::BiometricEnabled, flag(true))
            .await?;
        Ok(())
    }

    /// Clear the opt-in flag.
    pub async fn disable_biometric(&self) -> AuthResult<()> {
        self.store.delete(CredentialKey::BiometricEnabled).await?;
        Ok(())
    }

    /// Show the platform prompt and restore the stored session on success.
    pub async fn authenticate_with_biometrics(&self) -> AuthResult<()> {
        self.state.set(BiometricState::Authenticating);

        let passed = self
            .platform
            .authenticate(PROMPT_REASON, BiometricPromptOptions::default())
            .await;
        match passed {
            Ok(true) => {}
            Ok(false) => {
                self.state.set(BiometricState::Failed {
                    message: PROMPT_DECLINED_MESSAGE.to_string(),
                });
                return Err(AuthError::BiometricFailed);
            }
            Err(err) => {
                self.state.set(BiometricState::Failed {
                    message: err.to_string(),
                });
                return Err(AuthError::BiometricFailed);
            }
        }

        let token = self.read_or_none(CredentialKey::AuthToken).await;
        let user_id = self.read_or_none(CredentialKey::UserId).await;
        let email = self.read_or_none(CredentialKey::UserEmail).await;
        let (Some(token), Some(user_id), Some(email)) = (token, user_id, email) else {
            let err = AuthError::NoStoredSession;
            self.state.set(BiometricState::Failed {
                message: err.to_string(),
            });
            return Err(err);
        };

        self.sessions.restore_session(user_id, email, token).await;
        self.state.set(BiometricState::Authenticated);
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

impl std::fmt::Debug for BiometricAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricAuthenticator")
            .field("state", &self.state.current())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AuthState;
    use async_trait::async_trait;
    use clavex_core::ports::{BiometricKind, BiometricPlatformError};
    use clavex_core::store::MemoryCredentialStore;
    use clavex_core::stub::StubAuthenticator;

    /// Platform fake with a fixed answer per probe.
    struct FakePlatform {
        can_check: Result<bool, BiometricPlatformError>,
        supported: Result<bool, BiometricPlatformError>,
        enrolled: Result<Vec<BiometricKind>, BiometricPlatformError>,
        prompt: Result<bool, BiometricPlatformError>,
    }

    impl FakePlatform {
        fn capable() -> Self {
            Self {
                can_check: Ok(true),
                supported: Ok(true),
                enrolled: Ok(vec![BiometricKind::Fingerprint]),
                prompt: Ok(true),
            }
        }
    }

    #[async_trait]
    impl BiometricPlatform for FakePlatform {
        async fn can_check_biometrics(&self) -> Result<bool, BiometricPlatformError> {
            self.can_check.clone()
        }

        async fn is_device_supported(&self) -> Result<bool, BiometricPlatformError> {
            self.supported.clone()
        }

        async fn available_biometrics(&self) -> Result<Vec<BiometricKind>, BiometricPlatformError> {
            self.enrolled.clone()
        }

        async fn authenticate(
            &self,
            _reason: &str,
            _options: BiometricPromptOptions,
        ) -> Result<bool, BiometricPlatformError> {
            self.prompt.clone()
        }
    }

    fn fixture(
        store: Arc<MemoryCredentialStore>,
        platform: FakePlatform,
    ) -> (SessionManager, BiometricAuthenticator) {
        let sessions = SessionManager::new(store.clone(), Arc::new(StubAuthenticator::default()));
        let biometric = BiometricAuthenticator::new(Arc::new(platform), store, sessions.clone());
        (sessions, biometric)
    }

    #[tokio::test]
    async fn capable_device_is_available() {
        let store = Arc::new(MemoryCredentialStore::new());
        let (_sessions, biometric) = fixture(store, FakePlatform::capable());
        assert!(biometric.can_use_biometrics().await);
        assert_eq!(biometric.state().current(), BiometricState::Available);
    }

    #[tokio::test]
    async fn probe_errors_collapse_to_unavailable() {
        let store = Arc::new(MemoryCredentialStore::new());
        let platform = FakePlatform {
            can_check: Err(BiometricPlatformError("sensor offline".to_string())),
            ..FakePlatform::capable()
        };
        let (_sessions, biometric) = fixture(store, platform);
        assert!(!biometric.can_use_biometrics().await);
        assert_eq!(biometric.state().current(), BiometricState::Unavailable);
    }

    #[tokio::test]
    async fn missing_enrollment_is_unavailable() {
        let store = Arc::new(MemoryCredentialStore::new());
        let platform = FakePlatform {
            enrolled: Ok(Vec::new()),
            ..FakePlatform::capable()
        };
        let (_sessions, biometric) = fixture(store, platform);
        assert!(!biometric.can_use_biometrics().await);
        assert_eq!(biometric.state().current(), BiometricState::Unavailable);
    }

    #[tokio::test]
    async fn unsupported_device_is_unavailable() {
        let store = Arc::new(MemoryCredentialStore::new());
        let platform = FakePlatform {
            supported: Ok(false),
            ..FakePlatform::capable()
        };
        let (_sessions, biometric) = fixture(store, platform);
        assert!(!biometric.can_use_biometrics().await);
    }

    #[tokio::test]
    async fn enabled_flag_is_independent_of_capability() {
        let store = Arc::new(MemoryCredentialStore::new());
        let platform = FakePlatform {
            supported: Ok(false),
            ..FakePlatform::capable()
        };
        let (_sessions, biometric) = fixture(store.clone(), platform);

        assert!(!biometric.is_biometric_enabled().await);
        biometric.enable_biometric().await.unwrap();
        assert!(biometric.is_biometric_enabled().await);
        // Hardware says no, the flag still says yes.
        assert!(!biometric.can_use_biometrics().await);

        biometric.disable_biometric().await.unwrap();
        assert!(!biometric.is_biometric_enabled().await);
        assert_eq!(store.get(CredentialKey::BiometricEnabled).await.unwrap(), None);
    }

    #[tokio::test]
    async fn successful_prompt_restores_the_stored_session() {
        let store = Arc::new(MemoryCredentialStore::with_entries(&[
            (CredentialKey::AuthToken, "tok"),
            (CredentialKey::UserId, "user_1"),
            (CredentialKey::UserEmail, "a@b.com"),
        ]));
        let (sessions, biometric) = fixture(store, FakePlatform::capable());

        biometric.authenticate_with_biometrics().await.unwrap();
        assert_eq!(biometric.state().current(), BiometricState::Authenticated);
        assert_eq!(
            sessions.state().current(),
            AuthState::Authenticated {
                user_id: "user_1".to_string(),
                email: "a@b.com".to_string(),
                token: "tok".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn declined_prompt_fails() {
        let store = Arc::new(MemoryCredentialStore::new());
        let platform = FakePlatform {
            prompt: Ok(false),
            ..FakePlatform::capable()
        };
        let (sessions, biometric) = fixture(store, platform);

        let err = biometric.authenticate_with_biometrics().await.unwrap_err();
        assert!(matches!(err, AuthError::BiometricFailed));
        assert!(matches!(
            biometric.state().current(),
            BiometricState::Failed { .. }
        ));
        assert!(!sessions.state().is_authenticated());
    }

    #[tokio::test]
    async fn prompt_error_fails() {
        let store = Arc::new(MemoryCredentialStore::new());
        let platform = FakePlatform {
            prompt: Err(BiometricPlatformError("prompt crashed".to_string())),
            ..FakePlatform::capable()
        };
        let (_sessions, biometric) = fixture(store, platform);

        let err = biometric.authenticate_with_biometrics().await.unwrap_err();
        assert!(matches!(err, AuthError::BiometricFailed));
    }

    #[tokio::test]
    async fn passed_prompt_without_stored_session_fails_closed() {
        let store = Arc::new(MemoryCredentialStore::new());
        let (sessions, biometric) = fixture(store, FakePlatform::capable());

        let err = biometric.authenticate_with_biometrics().await.unwrap_err();
        assert!(matches!(err, AuthError::NoStoredSession));
        assert!(!sessions.state().is_authenticated());
    }
}
