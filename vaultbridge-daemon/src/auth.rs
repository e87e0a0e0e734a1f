//! API-key authentication and scope enforcement.
//!
//! Four scopes: `Read` (status/list/health),
//! `Inject` (launching a container with decrypted secrets — the one
//! operation that touches plaintext credentials), `Manage` (credential and
//! container lifecycle, adapter lifecycle), `Admin` (API key management).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Read,
    Inject,
    Manage,
    Admin,
}

impl Scope {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Scope::Read),
            "inject" => Some(Scope::Inject),
            "manage" => Some(Scope::Manage),
            "admin" => Some(Scope::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Inject => "inject",
            Scope::Manage => "manage",
            Scope::Admin => "admin",
        }
    }
}

pub fn has_scope(granted: &[Scope], required: &Scope) -> bool {
    granted.contains(&Scope::Admin) || granted.contains(required)
}

/// Maps a request's path/method to the scope it requires, or `None` for
/// endpoints open without authentication (health/readiness).
pub fn required_scope(path: &str, method: &str) -> Option<Scope> {
    if path == "/" || path == "/health" {
        return None;
    }
    if path == "/api/auth/whoami" {
        return Some(Scope::Read);
    }
    if path.starts_with("/api/auth/") {
        return Some(Scope::Admin);
    }
    if path.starts_with("/api/containers") && method == "POST" && path.ends_with("/launch") {
        return Some(Scope::Inject);
    }
    if method == "POST" || method == "DELETE" {
        return Some(Scope::Manage);
    }
    Some(Scope::Read)
}

pub fn hash_api_key(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

pub fn generate_api_key() -> String {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).expect("failed to generate random bytes");
    hex::encode(buf)
}

pub fn generate_key_id() -> String {
    let mut buf = [0u8; 8];
    getrandom::getrandom(&mut buf).expect("failed to generate random bytes");
    format!("vbk_{}", hex::encode(buf))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub id: String,
    pub name: String,
    pub key_hash: String,
    pub scopes: Vec<Scope>,
    pub created_at: String,
    pub active: bool,
    #[serde(default)]
    pub last_used: Option<String>,
}

#[derive(Serialize)]
pub struct ApiKeyInfo {
    pub id: String,
    pub name: String,
    pub scopes: Vec<Scope>,
    pub created_at: String,
    pub active: bool,
    pub last_used: Option<String>,
}

/// On-disk API-key registry, persisted as JSON next to the encrypted store
/// (never in it — these are bearer tokens to the daemon's own HTTP surface,
/// not secrets the containment model protects).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiKeyStore {
    pub keys: Vec<ApiKeyEntry>,
}

impl ApiKeyStore {
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::error!("failed to parse api-keys.json: {}", e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &str) -> Result<(), String> {
        let data = serde_json::to_string_pretty(self).map_err(|e| format!("serialize: {e}"))?;
        std::fs::write(path, data).map_err(|e| format!("write {path}: {e}"))
    }

    pub fn authenticate(&self, provided_hash: &[u8; 32]) -> Option<&ApiKeyEntry> {
        let provided_hex = hex::encode(provided_hash);
        self.keys.iter().find(|k| {
            k.active && {
                let stored = k.key_hash.as_bytes();
                let provided = provided_hex.as_bytes();
                stored.len() == provided.len() && bool::from(stored.ct_eq(provided))
            }
        })
    }

    pub fn add(&mut self, entry: ApiKeyEntry) {
        self.keys.push(entry);
    }

    pub fn deactivate(&mut self, id: &str) -> bool {
        if let Some(entry) = self.keys.iter_mut().find(|k| k.id == id) {
            entry.active = false;
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, id: &str) {
        if let Some(entry) = self.keys.iter_mut().find(|k| k.id == id) {
            entry.last_used = Some(chrono::Utc::now().to_rfc3339());
        }
    }

    pub fn list_info(&self) -> Vec<ApiKeyInfo> {
        self.keys
            .iter()
            .map(|k| ApiKeyInfo {
                id: k.id.clone(),
                name: k.name.clone(),
                scopes: k.scopes.clone(),
                created_at: k.created_at.clone(),
                active: k.active,
                last_used: k.last_used.clone(),
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct AuthContext {
    pub key_id: String,
    pub key_name: String,
    pub scopes: Vec<Scope>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, active: bool) -> ApiKeyEntry {
        ApiKeyEntry {
            id: id.to_string(),
            name: format!("{id}-name"),
            key_hash: hex::encode(hash_api_key("the-plaintext-key")),
            scopes: vec![Scope::Read],
            created_at: chrono::Utc::now().to_rfc3339(),
            active,
            last_used: None,
        }
    }

    #[test]
    fn load_returns_default_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let store = ApiKeyStore::load(path.to_str().unwrap());
        assert!(store.keys.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api-keys.json");

        let mut store = ApiKeyStore::default();
        store.add(entry("vbk_1", true));
        store.save(path.to_str().unwrap()).unwrap();

        let reloaded = ApiKeyStore::load(path.to_str().unwrap());
        assert_eq!(reloaded.keys.len(), 1);
        assert_eq!(reloaded.keys[0].id, "vbk_1");
    }

    #[test]
    fn authenticate_matches_active_key_by_hash() {
        let mut store = ApiKeyStore::default();
        store.add(entry("vbk_1", true));
        let hash = hash_api_key("the-plaintext-key");
        let found = store.authenticate(&hash).unwrap();
        assert_eq!(found.id, "vbk_1");
    }

    #[test]
    fn deactivated_key_does_not_authenticate() {
        let mut store = ApiKeyStore::default();
        store.add(entry("vbk_1", false));
        let hash = hash_api_key("the-plaintext-key");
        assert!(store.authenticate(&hash).is_none());
    }

    #[test]
    fn required_scope_maps_container_launch_to_inject() {
        assert_eq!(required_scope("/api/containers/abc/launch", "POST"), Some(Scope::Inject));
        assert_eq!(required_scope("/api/containers", "POST"), Some(Scope::Manage));
        assert_eq!(required_scope("/api/containers", "GET"), Some(Scope::Read));
        assert_eq!(required_scope("/health", "GET"), None);
    }

    #[test]
    fn has_scope_admin_implies_all_scopes() {
        assert!(has_scope(&[Scope::Admin], &Scope::Inject));
        assert!(!has_scope(&[Scope::Read], &Scope::Inject));
    }
}
