//! Token lifecycle: proactive refresh ahead of expiry.
//!
//! Independent of the login flow. The refresh threshold gives in-flight
//! requests a head start: a token inside the threshold is refreshed before
//! it actually lapses, and a failed refresh leaves the stored tokens
//! untouched so the stale token stays usable until it literally expires.

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, warn};

use clavex_core::credentials::{CredentialKey, encode_timestamp, parse_timestamp};
use clavex_core::ports::{CredentialStore, RefreshedTokens, RemoteAuthenticator};

const DEFAULT_REFRESH_THRESHOLD_MINUTES: i64 = 5;

/// Decides when the access token needs refreshing and performs the refresh.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    remote: Arc<dyn RemoteAuthenticator>,
    refresh_threshold: Duration,
}

impl TokenManager {
    /// Manager with the default 5-minute refresh threshold.
    pub fn new(store: Arc<dyn CredentialStore>, remote: Arc<dyn RemoteAuthenticator>) -> Self {
        Self {
            store,
            remote,
            refresh_threshold: Duration::minutes(DEFAULT_REFRESH_THRESHOLD_MINUTES),
        }
    }

    /// Override the refresh lead time.
    #[must_use]
    pub fn with_refresh_threshold(mut self, refresh_threshold: Duration) -> Self {
        self.refresh_threshold = refresh_threshold;
        self
    }

    /// Whether the stored token is inside the refresh window.
    ///
    /// An absent or unreadable expiry counts as expired: unknown is never
    /// trusted as fresh.
    pub async fn needs_refresh(&self) -> bool {
        let raw = match self.store.get(CredentialKey::TokenExpiration).await {
            Ok(value) => value,
            Err(err) => {
                debug!("Treating unreadable token expiry as expired: {err}");
                None
            }
        };
        let Some(expires_at) = raw.as_deref().and_then(parse_timestamp) else {
            return true;
        };
        Utc::now() >= expires_at - self.refresh_threshold
    }

    /// Exchange the stored refresh token for replacements.
    ///
    /// Returns `None` without touching storage when no refresh token is
    /// stored or the round-trip fails. On success the new access token,
    /// refresh token, and expiry land as one logical update with the expiry
    /// written last as the commit signal.
    pub async fn refresh(&self) -> Option<RefreshedTokens> {
        let refresh_token = match self.store.get(CredentialKey::RefreshToken).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No refresh token stored; skipping refresh");
                return None;
            }
            Err(err) => {
                warn!("Could not read refresh token: {err}");
                return None;
            }
        };

        match self.remote.refresh(&refresh_token).await {
            Ok(tokens) => {
                let entries = [
                    (CredentialKey::AuthToken, tokens.access_token.clone()),
                    (CredentialKey::RefreshToken, tokens.refresh_token.clone()),
                    (
                        CredentialKey::TokenExpiration,
                        encode_timestamp(tokens.expires_at),
                    ),
                ];
                if let Err(err) = self.store.put_many(&entries).await {
                    // The remote rotation succeeded; only restart persistence
                    // is lost, and the stored set is still self-consistent.
                    warn!("Failed to persist refreshed tokens: {err}");
                }
                Some(tokens)
            }
            Err(err) => {
                warn!("Token refresh failed: {err}");
                None
            }
        }
    }

    /// Run `action` after an opportunistic refresh.
    ///
    /// The refresh outcome is ignored; `action` executes exactly once
    /// whether the refresh succeeded, failed, or was skipped.
    pub async fn perform_with_refresh<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.needs_refresh().await {
            let _ = self.refresh().await;
        }
        action().await
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("refresh_threshold", &self.refresh_threshold)
            .finish_non_exhaustive()
    }
}
