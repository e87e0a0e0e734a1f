//! Key derivation: PBKDF2-HMAC-SHA512, 256_000 iterations, 32-byte output.
//!
//! The iteration count matches the encrypted store's own KDF parameters
//! (`vaultbridge-store` configures SQLCipher with the same `kdf_iter`) so a
//! single derivation reopens the database after a host restart with no
//! user interaction.

use hmac::Hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::aead::KEY_BYTES;
use crate::error::CryptoError;

pub const ITERATIONS: u32 = 256_000;

/// Derive the 32-byte master key from host entropy and the per-install salt.
pub fn derive_master_key(entropy: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_BYTES]>, CryptoError> {
    if salt.is_empty() {
        return Err(CryptoError::Malformed);
    }
    let mut key = Zeroizing::new([0u8; KEY_BYTES]);
    pbkdf2::pbkdf2::<Hmac<Sha512>>(entropy, salt, ITERATIONS, key.as_mut())
        .map_err(|_| CryptoError::RandomnessFailed)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let a = derive_master_key(b"host-entropy", b"some-salt-bytes").unwrap();
        let b = derive_master_key(b"host-entropy", b"some-salt-bytes").unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn differs_with_salt() {
        let a = derive_master_key(b"host-entropy", b"salt-a").unwrap();
        let b = derive_master_key(b"host-entropy", b"salt-b").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn differs_with_entropy() {
        let a = derive_master_key(b"host-a", b"salt").unwrap();
        let b = derive_master_key(b"host-b", b"salt").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn rejects_empty_salt() {
        assert_eq!(derive_master_key(b"entropy", b""), Err(CryptoError::Malformed));
    }
}
