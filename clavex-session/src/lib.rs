//! Session runtime for the Clavex authentication kernel.
//!
//! Builds the client-side session lifecycle on top of the `clavex-core`
//! contracts: a watch-channel state machine over login/logout/registration
//! with a failed-attempt lockout, proactive token refresh ahead of expiry,
//! a session-expiry guard with post-login return-path capture, and two
//! offline-capable fallbacks (6-digit PIN and platform biometrics) that
//! restore a previously persisted session without a remote round-trip.
//!
//! A composition root constructs one [`SessionManager`] and hands clones to
//! the fallback authenticators; every state transition is observable
//! through the watch subscriptions.

pub mod biometric;
pub mod guard;
pub mod manager;
pub mod offline_pin;
pub mod state;
pub mod token;

pub use biometric::{BiometricAuthenticator, BiometricState};
pub use guard::{ApiOutcome, SessionGuard};
pub use manager::SessionManager;
pub use offline_pin::{OfflinePinAuthenticator, OfflinePinState};
pub use state::{AuthState, AuthStateStore, StateCell};
pub use token::TokenManager;
