//! Zeroize-on-drop wrapper for passwords and PINs.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret string whose memory is zeroed on drop.
///
/// Holds passwords and PIN digits on their way through the kernel so that
/// sensitive bytes do not linger after the value goes out of scope. The
/// `Debug` implementation never prints the contents.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    data: String,
}

impl Secret {
    /// Wrap an owned string.
    pub fn new(data: String) -> Self {
        Self { data }
    }

    /// Borrow the secret contents.
    ///
    /// The returned slice aliases memory that is zeroed when the `Secret`
    /// drops; do not store it beyond that lifetime.
    pub fn expose(&self) -> &str {
        &self.data
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

impl From<String> for Secret {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<&str> for Secret {
    fn from(data: &str) -> Self {
        Self::new(data.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_contents() {
        let secret = Secret::from("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
    }

    #[test]
    fn exposes_original_value() {
        let secret = Secret::from("123456");
        assert_eq!(secret.expose(), "123456");
        assert_eq!(secret.len(), 6);
        assert!(!secret.is_empty());
    }
}
