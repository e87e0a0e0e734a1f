//! XChaCha20-Poly1305 seal/open.
//!
//! Nonces are 24 random bytes per call — wide enough that random generation
//! carries no meaningful reuse risk even across a long-lived database.

extern crate alloc;
use alloc::vec::Vec;

use chacha20poly1305::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;

pub const KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 24;

/// Seal `plaintext` under `key`, returning `(ciphertext, nonce)`.
///
/// `key` must be exactly [`KEY_BYTES`] bytes (the master key produced by
/// [`crate::kdf::derive_master_key`]). AAD is always empty — no associated
/// data is bound into the store's envelopes.
pub fn seal(key: &[u8; KEY_BYTES], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_BYTES]), CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Malformed)?;
    let mut nonce_bytes = [0u8; NONCE_BYTES];
    nonce_bytes.copy_from_slice(nonce.as_slice());
    Ok((ciphertext, nonce_bytes))
}

/// Open a ciphertext sealed by [`seal`]. Tag-verification failures and
/// malformed ciphertexts are not distinguishable to the caller — see
/// [`CryptoError`].
pub fn open(
    key: &[u8; KEY_BYTES],
    ciphertext: &[u8],
    nonce: &[u8; NONCE_BYTES],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() < 16 {
        return Err(CryptoError::Malformed);
    }
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Tampered)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [7u8; KEY_BYTES];
        let (ct, nonce) = seal(&key, b"sk-test-abc").unwrap();
        let pt = open(&key, &ct, &nonce).unwrap();
        assert_eq!(&pt[..], b"sk-test-abc");
    }

    #[test]
    fn wrong_nonce_fails() {
        let key = [7u8; KEY_BYTES];
        let (ct, mut nonce) = seal(&key, b"secret").unwrap();
        nonce[0] ^= 0xFF;
        assert_eq!(open(&key, &ct, &nonce), Err(CryptoError::Tampered));
    }

    #[test]
    fn wrong_key_fails() {
        let key = [7u8; KEY_BYTES];
        let other = [9u8; KEY_BYTES];
        let (ct, nonce) = seal(&key, b"secret").unwrap();
        assert_eq!(open(&other, &ct, &nonce), Err(CryptoError::Tampered));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [1u8; KEY_BYTES];
        let (mut ct, nonce) = seal(&key, b"payload").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert_eq!(open(&key, &ct, &nonce), Err(CryptoError::Tampered));
    }

    #[test]
    fn nonces_are_not_reused_across_calls() {
        let key = [3u8; KEY_BYTES];
        let (_, n1) = seal(&key, b"a").unwrap();
        let (_, n2) = seal(&key, b"a").unwrap();
        assert_ne!(n1, n2);
    }
}
