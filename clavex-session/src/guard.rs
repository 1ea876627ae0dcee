//! Session expiry guard: the gate in front of authenticated actions.
//!
//! Detects sessions that are past expiry with no refresh token left to
//! rescue them, clears the dead session, and captures the caller's location
//! so it can be replayed after re-authentication. An expired-but-refreshable
//! token is not reported here; refreshing it is the token manager's job.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};

use clavex_core::credentials::{CredentialKey, parse_timestamp};
use clavex_core::ports::CredentialStore;

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Outcome of a guarded API action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
    /// The session was live and the action ran.
    Success { data: T },
    /// The session was expired beyond recovery; the action never ran.
    SessionExpired {
        message: String,
        return_url: String,
    },
}

impl<T> ApiOutcome<T> {
    /// The action result, if the session was live.
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data } => Some(data),
            Self::SessionExpired { .. } => None,
        }
    }
}

/// Gate placed in front of authenticated actions.
pub struct SessionGuard {
    store: Arc<dyn CredentialStore>,
}

impl SessionGuard {
    /// Guard over the given credential store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Whether the stored session is expired beyond recovery.
    ///
    /// True with no stored expiry; true when past expiry with no refresh
    /// token; false otherwise. Unreadable values count as absent.
    pub async fn is_session_expired(&self) -> bool {
        let Some(expires_at) = self
            .read_or_none(CredentialKey::TokenExpiration)
            .await
            .as_deref()
            .and_then(parse_timestamp)
        else {
            return true;
        };

        if Utc::now() <= expires_at {
            return false;
        }

        // Past expiry: a surviving refresh token still makes the session
        // recoverable, so only its absence means expired here.
        self.read_or_none(CredentialKey::RefreshToken).await.is_none()
    }

    /// Run `action` unless the session is expired beyond recovery.
    ///
    /// On expiry the dead session keys are cleared, `current_path` is
    /// captured for post-login replay, and the action is never invoked.
    pub async fn perform_api_action<F, Fut, T>(
        &self,
        action: F,
        current_path: &str,
    ) -> ApiOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.is_session_expired().await {
            self.expire_session(current_path).await;
            return ApiOutcome::SessionExpired {
                message: SESSION_EXPIRED_MESSAGE.to_string(),
                return_url: current_path.to_string(),
            };
        }

        ApiOutcome::Success {
            data: action().await,
        }
    }

    /// Consume the pending return path, if one was captured.
    ///
    /// One-shot: a second call without an intervening capture returns `None`.
    pub async fn get_and_clear_return_url(&self) -> Option<String> {
        let url = self.read_or_none(CredentialKey::ReturnUrl).await?;
        if let Err(err) = self.store.delete(CredentialKey::ReturnUrl).await {
            warn!("Failed to clear return url: {err}");
        }
        Some(url)
    }

    async fn expire_session(&self, current_path: &str) {
        for key in [
            CredentialKey::AuthToken,
            CredentialKey::UserId,
            CredentialKey::UserEmail,
        ] {
            if let Err(err) = self.store.delete(key).await {
                warn!("Failed to clear {key} for expired session: {err}");
            }
        }
        if let Err(err) = self
            .store
            .put(CredentialKey::ReturnUrl, current_path)
            .await
        {
            warn!("Failed to capture return url: {err}");
        }
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

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard").finish_non_exhaustive()
    }
}
