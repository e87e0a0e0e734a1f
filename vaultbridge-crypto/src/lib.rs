//! # vaultbridge-crypto
//!
//! Hardware-bound key derivation and AEAD sealing for the VaultBridge
//! encrypted store.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vaultbridge_crypto::{entropy, salt::SaltStore, kdf, aead};
//!
//! let salt_store = SaltStore::for_database("/var/lib/vaultbridge/store.db");
//! let salt = salt_store.load_or_create().unwrap();
//! let entropy_bytes = entropy::collect();
//! let key = kdf::derive_master_key(&entropy_bytes, &salt).unwrap();
//!
//! let (ciphertext, nonce) = aead::seal(&key, b"sk-live-...").unwrap();
//! let plaintext = aead::open(&key, &ciphertext, &nonce).unwrap();
//! assert_eq!(&plaintext[..], b"sk-live-...");
//! ```
//!
//! ## Security properties
//!
//! - **Hardware-bound**: the derived key is unreadable on a different host
//!   without also knowing the per-install salt.
//! - **Uniform decryption errors**: tampering and malformed ciphertexts are
//!   not distinguishable beyond [`error::CryptoError`]'s two variants.
//! - **Zeroized throughout**: every derived key and decrypted plaintext is
//!   wrapped in `zeroize::Zeroizing`.
//!
//! ## What's NOT provided
//!
//! - Key management/rotation (that's `vaultbridge-store`'s job)
//! - A general KDF/AEAD abstraction over multiple algorithm choices

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod aead;
pub mod error;
pub mod kdf;

#[cfg(feature = "std")]
pub mod entropy;
#[cfg(feature = "std")]
pub mod salt;

pub use error::CryptoError;
