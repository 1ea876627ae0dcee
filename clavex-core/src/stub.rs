//! Sentinel-accepting remote authenticator for demos and tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ports::{RefreshedTokens, RemoteAuthError, RemoteAuthenticator, RemoteSession};

/// Password the stub accepts unless reconfigured.
pub const DEFAULT_ACCEPT_PASSWORD: &str = "Password123!";

const STUB_TOKEN: &str = "test_token_123";
const STUB_USER_ID: &str = "user_1";

/// Remote authenticator that accepts a single sentinel password.
///
/// `login`/`register` with the sentinel return a fixed session
/// (`test_token_123` / `user_1`); anything else is `Rejected`. Flipping
/// [`set_unreachable`](Self::set_unreachable) makes every call fail with
/// `Unreachable`, which is how tests drive the network-failure paths.
/// No refresh material is issued at login, matching providers that hand
/// refresh tokens out through a separate flow.
#[derive(Debug)]
pub struct StubAuthenticator {
    accept_password: String,
    unreachable: Mutex<bool>,
}

impl Default for StubAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPT_PASSWORD)
    }
}

impl StubAuthenticator {
    /// Stub accepting the given password.
    pub fn new(accept_password: &str) -> Self {
        Self {
            accept_password: accept_password.to_string(),
            unreachable: Mutex::new(false),
        }
    }

    /// Toggle the simulated network partition.
    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock() = unreachable;
    }

    fn check_reachable(&self) -> Result<(), RemoteAuthError> {
        if *self.unreachable.lock() {
            Err(RemoteAuthError::Unreachable(
                "connection refused".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn session_for(&self, password: &str) -> Result<RemoteSession, RemoteAuthError> {
        if password == self.accept_password {
            Ok(RemoteSession {
                token: STUB_TOKEN.to_string(),
                user_id: STUB_USER_ID.to_string(),
                refresh_token: None,
                expires_at: None,
            })
        } else {
            Err(RemoteAuthError::Rejected)
        }
    }
}

#[async_trait]
impl RemoteAuthenticator for StubAuthenticator {
    async fn login(&self, _email: &str, password: &str) -> Result<RemoteSession, RemoteAuthError> {
        self.check_reachable()?;
        self.session_for(password)
    }

    async fn register(
        &self,
        _name: &str,
        _email: &str,
        password: &str,
    ) -> Result<RemoteSession, RemoteAuthError> {
        self.check_reachable()?;
        self.session_for(password)
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, RemoteAuthError> {
        self.check_reachable()?;
        // The stub never issues refresh tokens, so it cannot honor one.
        Err(RemoteAuthError::Rejected)
    }
}
