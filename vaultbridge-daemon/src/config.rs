//! Environment-variable configuration, read once at startup, all under
//! the `VAULTBRIDGE_*` prefix.

/// Typed, defaulted configuration for the daemon process.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub docker_socket: Option<String>,
    pub log_format: String,
    pub rate_limit_rps: f64,
    pub rate_limit_burst: u32,
}

impl Config {
    /// Reads every `VAULTBRIDGE_*` variable, falling back to the documented
    /// default for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("VAULTBRIDGE_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(7420),
            data_dir: std::env::var("VAULTBRIDGE_DATA_DIR").unwrap_or_else(|_| "./vaultbridge-data".into()),
            docker_socket: std::env::var("VAULTBRIDGE_DOCKER_SOCKET").ok().filter(|s| !s.is_empty()),
            log_format: std::env::var("VAULTBRIDGE_LOG_FORMAT").unwrap_or_else(|_| "pretty".into()),
            rate_limit_rps: std::env::var("VAULTBRIDGE_RATE_LIMIT_RPS").ok().and_then(|v| v.parse().ok()).unwrap_or(20.0),
            rate_limit_burst: std::env::var("VAULTBRIDGE_RATE_LIMIT_BURST").ok().and_then(|v| v.parse().ok()).unwrap_or(50),
        }
    }

    pub fn dbpath(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("store.db")
    }
}

/// Bootstrap admin key material: a hash takes precedence over a
/// plaintext key, and either is optional (dev mode opens every endpoint
/// when neither is set).
pub fn resolve_bootstrap_hash() -> Option<[u8; 32]> {
    use sha2::{Digest, Sha256};

    if let Ok(hex_hash) = std::env::var("VAULTBRIDGE_API_KEY_HASH") {
        let hex_hash = hex_hash.trim();
        if hex_hash.is_empty() {
            return None;
        }
        if hex_hash.len() != 64 {
            tracing::error!("VAULTBRIDGE_API_KEY_HASH must be 64 hex characters");
            std::process::exit(1);
        }
        let mut hash = [0u8; 32];
        return match hex::decode_to_slice(hex_hash, &mut hash) {
            Ok(()) => Some(hash),
            Err(e) => {
                tracing::error!("VAULTBRIDGE_API_KEY_HASH invalid hex: {}", e);
                std::process::exit(1);
            }
        };
    }
    if let Ok(pt) = std::env::var("VAULTBRIDGE_API_KEY") {
        let pt = pt.trim();
        if pt.is_empty() {
            return None;
        }
        tracing::warn!("using VAULTBRIDGE_API_KEY (plaintext) — use VAULTBRIDGE_API_KEY_HASH for production");
        let mut hasher = Sha256::new();
        hasher.update(pt.as_bytes());
        return Some(hasher.finalize().into());
    }
    None
}
