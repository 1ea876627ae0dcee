//! Credential key namespace and timestamp encoding shared by every store
//! adapter and session component.

use chrono::{DateTime, TimeZone, Utc};

/// Keys of the secure credential store.
///
/// The namespace is a stable contract: adapters persist these exact strings,
/// so renaming a variant without migrating stored data orphans the old entry.
/// Values are strings; timestamps are decimal epoch-millisecond strings and
/// boolean flags are `"true"`/`"false"` (see [`flag`]/[`parse_flag`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    /// Current access token.
    AuthToken,
    /// Refresh token used to mint new access tokens.
    RefreshToken,
    /// Access token expiry, epoch milliseconds.
    TokenExpiration,
    /// Identifier of the authenticated user.
    UserId,
    /// Email of the authenticated user.
    UserEmail,
    /// Whether biometric unlock is enabled on this device.
    BiometricEnabled,
    /// Whether the offline PIN fallback is enabled.
    OfflinePinEnabled,
    /// One-way hash of the offline PIN.
    OfflinePinHash,
    /// Path to replay after re-authentication.
    ReturnUrl,
}

impl CredentialKey {
    /// Storage representation of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthToken => "auth_token",
            Self::RefreshToken => "refresh_token",
            Self::TokenExpiration => "token_expiration",
            Self::UserId => "user_id",
            Self::UserEmail => "user_email",
            Self::BiometricEnabled => "biometric_enabled",
            Self::OfflinePinEnabled => "offline_pin_enabled",
            Self::OfflinePinHash => "offline_pin_hash",
            Self::ReturnUrl => "return_url",
        }
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode a timestamp as a decimal epoch-millisecond string.
pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

/// Parse a decimal epoch-millisecond string back into a timestamp.
///
/// Returns `None` for anything unparseable; callers treat that the same as
/// an absent value rather than failing open.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Encode a boolean flag for storage.
pub fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Parse a stored boolean flag. Anything but `"true"` is false.
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true"))
}
