//! Port traits for the platform services the kernel depends on.
//!
//! Everything external is injected through these contracts: the secure
//! key-value store, the connectivity probe, the remote authenticator, and
//! the platform biometric prompt. Production adapters wrap the real
//! platform services; tests plug in fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::CredentialKey;
use crate::error::StorageError;

/// Secure key-value persistence for credentials.
///
/// String-keyed, string-valued; see [`CredentialKey`] for the namespace and
/// value encodings.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value, `None` when absent.
    async fn get(&self, key: CredentialKey) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: CredentialKey, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting an absent key succeeds.
    async fn delete(&self, key: CredentialKey) -> Result<(), StorageError>;

    /// Apply several writes as one logical update.
    ///
    /// The default writes sequentially in caller order; callers place the
    /// key whose presence readers treat as the commit signal last, so an
    /// interrupted update never yields a readable partial set. Adapters
    /// that can commit atomically should override this.
    async fn put_many(&self, entries: &[(CredentialKey, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.put(*key, value).await?;
        }
        Ok(())
    }
}

/// Cached online/offline signal.
pub trait ConnectivityProbe: Send + Sync {
    /// Whether the device currently has network connectivity.
    fn is_online(&self) -> bool;
}

/// A session minted by the remote authenticator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSession {
    /// Access token for authenticated calls.
    pub token: String,
    /// Identifier of the authenticated user.
    pub user_id: String,
    /// Refresh token, when the provider issues one at login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry, when the provider reports one at login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Replacement tokens from a refresh round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshedTokens {
    /// New access token.
    pub access_token: String,
    /// New refresh token.
    pub refresh_token: String,
    /// New access token expiry.
    pub expires_at: DateTime<Utc>,
}

/// Remote authenticator failures, classified at the boundary.
///
/// The distinction drives retry semantics: `Unreachable` is retryable,
/// `Rejected` is not.
#[derive(Debug, Clone, Error)]
pub enum RemoteAuthError {
    /// The authenticator understood the request and refused it.
    #[error("Credentials rejected")]
    Rejected,

    /// The authenticator could not be reached.
    #[error("Network unreachable: {0}")]
    Unreachable(String),
}

/// Round-trips to the identity provider.
///
/// The wire protocol behind these calls is not this crate's concern;
/// adapters own transport, serialization, and endpoint layout.
#[async_trait]
pub trait RemoteAuthenticator: Send + Sync {
    /// Exchange email + password for a session.
    async fn login(&self, email: &str, password: &str) -> Result<RemoteSession, RemoteAuthError>;

    /// Create a new identity and return its first session.
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<RemoteSession, RemoteAuthError>;

    /// Exchange a refresh token for replacement tokens.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RemoteAuthError>;
}

/// Kinds of biometric factors a device may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiometricKind {
    /// Face recognition.
    Face,
    /// Fingerprint reader.
    Fingerprint,
    /// Iris scanner.
    Iris,
    /// Platform-classified weak factor.
    Weak,
    /// Platform-classified strong factor.
    Strong,
}

/// Options for the platform biometric prompt.
#[derive(Debug, Clone, Copy)]
pub struct BiometricPromptOptions {
    /// Keep the prompt alive across app backgrounding.
    pub sticky_auth: bool,
    /// Refuse device-credential (PIN/pattern) fallback inside the prompt.
    pub biometric_only: bool,
}

impl Default for BiometricPromptOptions {
    fn default() -> Self {
        Self {
            sticky_auth: true,
            biometric_only: true,
        }
    }
}

/// Platform biometric probe or prompt failure.
#[derive(Debug, Clone, Error)]
#[error("Biometric platform error: {0}")]
pub struct BiometricPlatformError(pub String);

/// Platform biometric hardware access.
///
/// Callers treat every error here as "unavailable"; the kernel never
/// assumes capability on a failed probe.
#[async_trait]
pub trait BiometricPlatform: Send + Sync {
    /// Whether the device can check biometrics at all.
    async fn can_check_biometrics(&self) -> Result<bool, BiometricPlatformError>;

    /// Whether the device supports platform authentication.
    async fn is_device_supported(&self) -> Result<bool, BiometricPlatformError>;

    /// Enrolled biometric factors.
    async fn available_biometrics(&self) -> Result<Vec<BiometricKind>, BiometricPlatformError>;

    /// Show the platform prompt; `true` means the user passed it.
    async fn authenticate(
        &self,
        reason: &str,
        options: BiometricPromptOptions,
    ) -> Result<bool, BiometricPlatformError>;
}
