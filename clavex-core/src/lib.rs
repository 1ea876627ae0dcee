//! Core contracts for the Clavex authentication kernel.
//!
//! This crate defines everything the session runtime is built on top of:
//! the secure credential key namespace, the port traits for platform
//! services (credential store, connectivity probe, remote authenticator,
//! biometric hardware), the error taxonomy, PIN validation and hashing,
//! the failed-attempt lockout policy, and two credential store adapters
//! (an in-memory map for tests and an encrypted file for production).
//!
//! Nothing here talks to a real identity provider or renders UI; those
//! concerns live behind the ports.

pub mod credentials;
pub mod error;
pub mod lockout;
pub mod pin;
pub mod ports;
pub mod secret;
pub mod store;
pub mod stub;

pub use credentials::CredentialKey;
pub use error::{AuthError, AuthResult, StorageError};
pub use lockout::{LockoutPolicy, LockoutTracker};
pub use pin::{PIN_LENGTH, PinError, hash_pin, validate_pin};
pub use ports::{
    BiometricKind, BiometricPlatform, BiometricPlatformError, BiometricPromptOptions,
    ConnectivityProbe, CredentialStore, RefreshedTokens, RemoteAuthError, RemoteAuthenticator,
    RemoteSession,
};
pub use secret::Secret;
pub use store::{EncryptedFileStore, MemoryCredentialStore};
pub use stub::StubAuthenticator;
