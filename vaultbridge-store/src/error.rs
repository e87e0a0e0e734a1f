//! Error taxonomy for the encrypted store.

use std::fmt;

/// Stable error taxonomy for every store operation.
#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    Expired(String),
    InvalidCredential(String),
    /// The database is locked/busy by another writer. Retryable.
    Locked,
    /// A row's ciphertext failed to decrypt — may indicate tampering.
    Decryption(String),
    Io(String),
}

impl StoreError {
    /// The retry classifier: `Locked` and `Io` are transient, everything
    /// else is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked | Self::Io(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "not found: {id}"),
            Self::Expired(id) => write!(f, "expired: {id}"),
            Self::InvalidCredential(msg) => write!(f, "invalid credential: {msg}"),
            Self::Locked => write!(f, "store locked/busy"),
            Self::Decryption(id) => write!(f, "decryption failed for {id}"),
            Self::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Self::Locked
            }
            other => Self::Io(other.to_string()),
        }
    }
}

impl From<vaultbridge_crypto::CryptoError> for StoreError {
    fn from(e: vaultbridge_crypto::CryptoError) -> Self {
        Self::Decryption(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Wrapper for `RetrieveWithRetry`-style operations, carrying how many
/// attempts were made before giving up.
#[derive(Debug)]
pub struct RetryError {
    pub attempts: u32,
    pub source: StoreError,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempt(s): {}", self.attempts, self.source)
    }
}

impl std::error::Error for RetryError {}
