//! Offline PIN validation and hashing.
//!
//! The stored value is always a one-way digest; plaintext PINs never touch
//! the credential store and verification is hash-compare only.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Required PIN length in digits.
pub const PIN_LENGTH: usize = 6;

// Domain separation for the digest so a stored PIN hash can never collide
// with hashes produced elsewhere from the same digits.
const PIN_HASH_SALT: &str = "clavex-offline-pin-v1";

/// PIN validation and verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("PIN is too short (minimum {min} digits)")]
    TooShort { min: usize },

    #[error("PIN is too long (maximum {max} digits)")]
    TooLong { max: usize },

    #[error("PIN must contain only digits")]
    InvalidCharacters,

    #[error("No PIN set")]
    NotSet,

    #[error("Incorrect PIN")]
    Incorrect,

    #[error("Cannot enable PIN while offline")]
    EnrollmentRequiresNetwork,
}

/// Validate a candidate PIN: exactly [`PIN_LENGTH`] ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), PinError> {
    if pin.len() < PIN_LENGTH {
        return Err(PinError::TooShort { min: PIN_LENGTH });
    }
    if pin.len() > PIN_LENGTH {
        return Err(PinError::TooLong { max: PIN_LENGTH });
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(PinError::InvalidCharacters);
    }
    Ok(())
}

/// One-way transform of a PIN for storage.
///
/// Salted SHA-256 rendered as lowercase hex. Deterministic so verification
/// is a straight string compare against the stored digest.
pub fn hash_pin(pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(PIN_HASH_SALT.as_bytes());
    hasher.update(pin.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
