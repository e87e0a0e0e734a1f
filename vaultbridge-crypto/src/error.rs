//! Unified error types for the crypto primitives.

use core::fmt;

/// A decryption failure. Deliberately uniform: callers cannot distinguish
/// "wrong key" from "corrupt ciphertext" from "wrong nonce" beyond this
/// type's single variant-free shape, so no oracle is exposed across the
/// AEAD boundary. The audit log records more detail; this type does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The AEAD tag did not verify. May indicate tampering.
    Tampered,
    /// The ciphertext is too short or otherwise structurally invalid.
    Malformed,
    /// Entropy or randomness source failed.
    RandomnessFailed,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tampered => write!(f, "decryption failed"),
            Self::Malformed => write!(f, "malformed ciphertext"),
            Self::RandomnessFailed => write!(f, "randomness source failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}
