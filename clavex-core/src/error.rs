//! Authentication error types
//!
//! Every failure in the kernel is an explicit value from this taxonomy;
//! nothing is surfaced as a panic or an untyped string.

use thiserror::Error;

use crate::pin::PinError;

/// Main authentication error type
#[derive(Debug, Error)]
pub enum AuthError {
    /// The remote authenticator rejected the presented credentials.
    ///
    /// Not retryable as-is; callers should clear the password input.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The remote authenticator was unreachable.
    ///
    /// Retryable; callers should preserve the password input and offer retry.
    #[error("Network error: {0}")]
    Network(String),

    /// Login refused while the lockout window is in effect.
    ///
    /// Satisfied only by waiting out the window; no manual unlock exists.
    #[error("Account temporarily locked. Try again in {} seconds", .remaining.num_seconds())]
    AccountLocked {
        /// Time left until login attempts are accepted again.
        remaining: chrono::Duration,
    },

    /// Locally detected invalid input; never reached the remote authenticator.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Offline PIN handling failed.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// The stored session is expired and cannot be refreshed.
    #[error("Session expired")]
    SessionExpired,

    /// Credential store operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Biometric hardware is missing, unenrolled, or failed its capability
    /// probe.
    #[error("Biometric authentication is not available on this device")]
    BiometricUnavailable,

    /// The platform biometric prompt was declined or errored.
    #[error("Biometric authentication failed")]
    BiometricFailed,

    /// A fallback unlock succeeded but no previously stored session exists to
    /// restore.
    #[error("No stored session to restore")]
    NoStoredSession,
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to initialize storage: {0}")]
    InitFailed(String),

    #[error("Failed to read from storage: {0}")]
    ReadFailed(String),

    #[error("Failed to write to storage: {0}")]
    WriteFailed(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Corrupted storage data")]
    CorruptedData,
}

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
