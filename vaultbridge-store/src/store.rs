//! The encrypted store: credentials, Matrix refresh tokens, and
//! PII profiles, all sealed with `vaultbridge-crypto`'s AEAD codec on top of
//! a SQLCipher-backed `rusqlite` connection.
//!
//! A single `tokio::sync::RwLock` guards the connection and (implicitly,
//! by closure) the master key; reads
//! take the read side, writes take the write side, and no `Store*`/`Delete*`
//! call suspends on unrelated I/O while holding the write guard across more
//! than one SQL statement.

use std::path::{Path, PathBuf};
use std::sync::RwLock as StdRwLock;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use vaultbridge_audit::{Actor, AuditEntry, AuditSinkSync, Compliance, Resource};
use vaultbridge_crypto::aead;

use crate::error::{RetryError, StoreError};
use crate::retry;
use crate::types::*;

const SCHEMA_VERSION: &str = "1";

pub struct Store {
    conn: RwLock<Connection>,
    key: Zeroizing<[u8; 32]>,
    audit: StdRwLock<Option<std::sync::Arc<dyn AuditSinkSync>>>,
    last_accessed_tx: tokio::sync::mpsc::UnboundedSender<String>,
    _last_accessed_task: tokio::task::JoinHandle<()>,
}

impl Store {
    /// Opens (creating if absent) the encrypted database at `path`, keyed by
    /// `master_key` (from `vaultbridge_crypto::kdf::derive_master_key`).
    /// Idempotent: a fresh path creates the schema, an existing one reopens.
    pub async fn open(path: impl AsRef<Path>, master_key: Zeroizing<[u8; 32]>) -> Result<Self, StoreError> {
        let path: PathBuf = path.as_ref().to_owned();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            set_dir_owner_only(parent)?;
        }

        let conn = Self::open_keyed_connection(&path, &master_key)?;
        // A second connection dedicated to best-effort `last_accessed`
        // bumps, so that tracking never shares the main read/write lock and
        // can never block a caller's result.
        let touch_conn = Self::open_keyed_connection(&path, &master_key)?;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(async move {
            while let Some(id) = rx.recv().await {
                let _ = touch_conn.execute(
                    "UPDATE user_profiles SET last_accessed = ?1 WHERE id = ?2",
                    params![Utc::now().to_rfc3339(), id],
                );
            }
        });

        let store = Self {
            conn: RwLock::new(conn),
            key: master_key,
            audit: StdRwLock::new(vaultbridge_audit::default_logger()),
            last_accessed_tx: tx,
            _last_accessed_task: task,
        };
        store.init_schema().await?;
        Ok(store)
    }

    fn open_keyed_connection(path: &Path, master_key: &Zeroizing<[u8; 32]>) -> Result<Connection, StoreError> {
        let key_hex = hex::encode(master_key.as_slice());
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "key", format!("x'{key_hex}'"))?;
        conn.pragma_update(None, "cipher_page_size", 4096)?;
        conn.pragma_update(None, "kdf_iter", vaultbridge_crypto::kdf::ITERATIONS)?;
        conn.pragma_update(None, "cipher_hmac_algorithm", "HMAC_SHA512")?;
        conn.pragma_update(None, "cipher_kdf_algorithm", "PBKDF2_HMAC_SHA512")?;
        // Touch the database to confirm the key unlocks it.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
        Ok(conn)
    }

    /// Idempotent; drops the connection. A `Store` is unusable afterward.
    pub async fn close(self) -> Result<(), StoreError> {
        self._last_accessed_task.abort();
        let conn = self.conn.into_inner();
        conn.close().map_err(|(_, e)| e.into())
    }

    pub fn set_audit_logger(&self, logger: Option<std::sync::Arc<dyn AuditSinkSync>>) {
        *self.audit.write().expect("audit lock poisoned") = logger;
    }

    fn audit(&self, entry: AuditEntry) {
        vaultbridge_audit::compliance::assert_pii_safe(&entry);
        if let Some(logger) = self.audit.read().expect("audit lock poisoned").as_ref() {
            logger.record(entry);
        }
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.write().await;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                token_ciphertext BLOB NOT NULL,
                nonce BLOB NOT NULL,
                display_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT,
                tags_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_credentials_provider ON credentials(provider);
            CREATE INDEX IF NOT EXISTS idx_credentials_expires_at ON credentials(expires_at);

            CREATE TABLE IF NOT EXISTS matrix_refresh_tokens (
                id TEXT PRIMARY KEY,
                token_ciphertext BLOB NOT NULL,
                nonce BLOB NOT NULL,
                homeserver_url TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_profiles (
                id TEXT PRIMARY KEY,
                profile_name TEXT NOT NULL,
                profile_type TEXT NOT NULL,
                data_ciphertext BLOB NOT NULL,
                data_nonce BLOB NOT NULL,
                field_schema TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_accessed TEXT,
                is_default INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_type ON user_profiles(profile_type);
            CREATE INDEX IF NOT EXISTS idx_profiles_default ON user_profiles(is_default);

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO metadata(key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO metadata(key, value) VALUES ('created_at', ?1)",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    /// Upsert-by-id: replacing an existing row re-encrypts with a fresh nonce.
    pub async fn store_credential(&self, cred: NewCredential) -> Result<(), StoreError> {
        let (ciphertext, nonce) = aead::seal(&self.key, cred.token.as_bytes())?;
        let tags_json = serde_json::to_string(&cred.tags).unwrap_or_else(|_| "[]".into());
        let conn = self.conn.write().await;
        conn.execute(
            "INSERT INTO credentials(id, provider, token_ciphertext, nonce, display_name, created_at, expires_at, tags_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                provider = excluded.provider,
                token_ciphertext = excluded.token_ciphertext,
                nonce = excluded.nonce,
                display_name = excluded.display_name,
                expires_at = excluded.expires_at,
                tags_json = excluded.tags_json",
            params![
                cred.id,
                cred.provider.as_str(),
                ciphertext,
                nonce.to_vec(),
                cred.display_name,
                cred.created_at.to_rfc3339(),
                cred.expires_at.map(|t| t.to_rfc3339()),
                tags_json,
            ],
        )?;
        drop(conn);

        self.audit(
            AuditEntry::new("key.created", Actor::system(), "store_credential", Compliance::critical("credential"))
                .with_resource(Resource::new("credential", cred.id.clone()))
                .with_detail("provider", cred.provider.as_str()),
        );
        Ok(())
    }

    pub async fn retrieve_credential(&self, id: &str) -> Result<Credential, StoreError> {
        let result = self.retrieve_credential_inner(id).await;
        self.audit(
            AuditEntry::new("key.access", Actor::system(), "retrieve_credential", Compliance::routine("credential"))
                .with_resource(Resource::new("credential", id))
                .with_detail("success", result.is_ok()),
        );
        result
    }

    async fn retrieve_credential_inner(&self, id: &str) -> Result<Credential, StoreError> {
        let conn = self.conn.read().await;
        let row = conn
            .query_row(
                "SELECT provider, token_ciphertext, nonce, display_name, created_at, expires_at, tags_json
                 FROM credentials WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;
        drop(conn);

        let (provider, ciphertext, nonce, display_name, created_at, expires_at, tags_json) =
            row.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let expires_at: Option<DateTime<Utc>> = expires_at.and_then(|s| s.parse().ok());
        if let Some(exp) = expires_at {
            if exp < Utc::now() {
                return Err(StoreError::Expired(id.to_string()));
            }
        }

        let mut nonce_bytes = [0u8; aead::NONCE_BYTES];
        if nonce.len() != aead::NONCE_BYTES {
            return Err(StoreError::Decryption(id.to_string()));
        }
        nonce_bytes.copy_from_slice(&nonce);
        let plaintext = aead::open(&self.key, &ciphertext, &nonce_bytes)?;
        let token = String::from_utf8(plaintext.to_vec()).map_err(|_| StoreError::Decryption(id.to_string()))?;

        Ok(Credential {
            id: id.to_string(),
            provider: Provider::parse(&provider)?,
            token,
            display_name,
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            expires_at,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        })
    }

    /// Wraps `retrieve_credential` with exponential backoff for
    /// retryable errors.
    pub async fn retrieve_with_retry(&self, id: &str, max_attempts: u32) -> Result<Credential, RetryError> {
        retry::with_backoff(max_attempts, || self.retrieve_credential(id)).await
    }

    /// Listing never decrypts — metadata only.
    pub async fn list_credentials(&self, provider: Option<Provider>) -> Result<Vec<CredentialSummary>, StoreError> {
        let conn = self.conn.read().await;
        let mut stmt = match provider {
            Some(_) => conn.prepare(
                "SELECT id, provider, display_name, created_at, expires_at, tags_json FROM credentials WHERE provider = ?1",
            )?,
            None => conn.prepare("SELECT id, provider, display_name, created_at, expires_at, tags_json FROM credentials")?,
        };
        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<CredentialSummary> {
            let provider_str: String = row.get(1)?;
            let tags_json: String = row.get(5)?;
            let expires_at: Option<String> = row.get(4)?;
            Ok(CredentialSummary {
                id: row.get(0)?,
                provider: Provider::parse(&provider_str).unwrap_or(Provider::Openai),
                display_name: row.get(2)?,
                created_at: row.get::<_, String>(3)?.parse().unwrap_or_else(|_| Utc::now()),
                expires_at: expires_at.and_then(|s| s.parse().ok()),
                tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            })
        };
        let rows = match provider {
            Some(p) => stmt.query_map(params![p.as_str()], map_row)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    pub async fn delete_credential(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.write().await;
        let affected = conn.execute("DELETE FROM credentials WHERE id = ?1", params![id])?;
        drop(conn);

        self.audit(
            AuditEntry::new("key.deleted", Actor::system(), "delete_credential", Compliance::critical("credential"))
                .with_resource(Resource::new("credential", id))
                .with_detail("existed", affected > 0),
        );
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Matrix refresh tokens
    // -----------------------------------------------------------------------

    pub async fn store_refresh_token(&self, token: NewRefreshToken) -> Result<(), StoreError> {
        let (ciphertext, nonce) = aead::seal(&self.key, token.token.as_bytes())?;
        let conn = self.conn.write().await;
        conn.execute(
            "INSERT INTO matrix_refresh_tokens(id, token_ciphertext, nonce, homeserver_url, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                token_ciphertext = excluded.token_ciphertext,
                nonce = excluded.nonce,
                homeserver_url = excluded.homeserver_url,
                user_id = excluded.user_id",
            params![token.id, ciphertext, nonce.to_vec(), token.homeserver_url, token.user_id, token.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn retrieve_refresh_token(&self, id: &str) -> Result<RefreshToken, StoreError> {
        let conn = self.conn.read().await;
        let row = conn
            .query_row(
                "SELECT token_ciphertext, nonce, homeserver_url, user_id, created_at FROM matrix_refresh_tokens WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        drop(conn);

        let (ciphertext, nonce, homeserver_url, user_id, created_at) =
            row.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut nonce_bytes = [0u8; aead::NONCE_BYTES];
        if nonce.len() != aead::NONCE_BYTES {
            return Err(StoreError::Decryption(id.to_string()));
        }
        nonce_bytes.copy_from_slice(&nonce);
        let plaintext = aead::open(&self.key, &ciphertext, &nonce_bytes)?;
        let token = String::from_utf8(plaintext.to_vec()).map_err(|_| StoreError::Decryption(id.to_string()))?;

        Ok(RefreshToken {
            id: id.to_string(),
            token,
            homeserver_url,
            user_id,
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        })
    }

    pub async fn delete_refresh_token(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.write().await;
        let affected = conn.execute("DELETE FROM matrix_refresh_tokens WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // PII profiles
    // -----------------------------------------------------------------------

    pub async fn store_profile(&self, profile: NewProfile) -> Result<(), StoreError> {
        let data_bytes = serde_json::to_vec(&profile.data).map_err(|e| StoreError::InvalidCredential(e.to_string()))?;
        let (ciphertext, nonce) = aead::seal(&self.key, &data_bytes)?;
        let field_schema = serde_json::to_string(&profile.field_schema).unwrap_or_else(|_| "{}".into());
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn.write().await;
        let tx = conn.transaction()?;
        if profile.is_default {
            tx.execute(
                "UPDATE user_profiles SET is_default = 0 WHERE profile_type = ?1 AND id != ?2",
                params![profile.profile_type, profile.id],
            )?;
        }
        let existing_created_at: Option<String> = tx
            .query_row("SELECT created_at FROM user_profiles WHERE id = ?1", params![profile.id], |r| r.get(0))
            .optional()?;
        let created_at = existing_created_at.unwrap_or_else(|| now.clone());
        tx.execute(
            "INSERT INTO user_profiles(id, profile_name, profile_type, data_ciphertext, data_nonce, field_schema, created_at, updated_at, last_accessed, is_default)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)
             ON CONFLICT(id) DO UPDATE SET
                profile_name = excluded.profile_name,
                profile_type = excluded.profile_type,
                data_ciphertext = excluded.data_ciphertext,
                data_nonce = excluded.data_nonce,
                field_schema = excluded.field_schema,
                updated_at = excluded.updated_at,
                is_default = excluded.is_default",
            params![
                profile.id,
                profile.profile_name,
                profile.profile_type,
                ciphertext,
                nonce.to_vec(),
                field_schema,
                created_at,
                now,
                profile.is_default as i64,
            ],
        )?;
        tx.commit()?;
        drop(conn);

        self.audit(
            AuditEntry::new("pii.profile_stored", Actor::system(), "store_profile", Compliance::pii("pii"))
                .with_resource(Resource::new("profile", profile.id.clone()))
                .with_detail("profile_type", profile.profile_type),
        );
        Ok(())
    }

    pub async fn retrieve_profile(&self, id: &str) -> Result<Profile, StoreError> {
        let result = self.retrieve_profile_inner(id).await;
        self.audit(
            AuditEntry::new("pii.profile_accessed", Actor::system(), "retrieve_profile", Compliance::pii("pii"))
                .with_resource(Resource::new("profile", id))
                .with_detail("success", result.is_ok()),
        );
        if result.is_ok() {
            self.touch_last_accessed(id);
        }
        result
    }

    async fn retrieve_profile_inner(&self, id: &str) -> Result<Profile, StoreError> {
        let conn = self.conn.read().await;
        let row = conn
            .query_row(
                "SELECT profile_name, profile_type, data_ciphertext, data_nonce, field_schema, created_at, updated_at, last_accessed, is_default
                 FROM user_profiles WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()?;
        drop(conn);

        let (profile_name, profile_type, ciphertext, nonce, field_schema, created_at, updated_at, last_accessed, is_default) =
            row.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut nonce_bytes = [0u8; aead::NONCE_BYTES];
        if nonce.len() != aead::NONCE_BYTES {
            return Err(StoreError::Decryption(id.to_string()));
        }
        nonce_bytes.copy_from_slice(&nonce);
        let plaintext = aead::open(&self.key, &ciphertext, &nonce_bytes)?;
        let data: serde_json::Value = serde_json::from_slice(&plaintext).map_err(|_| StoreError::Decryption(id.to_string()))?;

        Ok(Profile {
            id: id.to_string(),
            profile_name,
            profile_type,
            field_schema: serde_json::from_str(&field_schema).unwrap_or(serde_json::Value::Null),
            data,
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
            last_accessed: last_accessed.and_then(|s| s.parse().ok()),
            is_default: is_default != 0,
        })
    }

    /// Best-effort, fire-and-forget update — must never block the caller's
    /// result. The dedicated
    /// connection and channel opened in [`Store::open`] mean this never
    /// contends with the main read/write lock.
    fn touch_last_accessed(&self, id: &str) {
        let _ = self.last_accessed_tx.send(id.to_string());
    }

    pub async fn list_profiles(&self, profile_type: Option<&str>) -> Result<Vec<ProfileSummary>, StoreError> {
        let conn = self.conn.read().await;
        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<ProfileSummary> {
            let field_schema: String = row.get(4)?;
            Ok(ProfileSummary {
                id: row.get(0)?,
                profile_name: row.get(1)?,
                profile_type: row.get(2)?,
                field_schema: serde_json::from_str(&field_schema).unwrap_or(serde_json::Value::Null),
                created_at: row.get::<_, String>(5)?.parse().unwrap_or_else(|_| Utc::now()),
                updated_at: row.get::<_, String>(6)?.parse().unwrap_or_else(|_| Utc::now()),
                is_default: row.get::<_, i64>(7)? != 0,
            })
        };
        let rows = match profile_type {
            Some(t) => {
                let mut stmt = conn.prepare(
                    "SELECT id, profile_name, profile_type, is_default, field_schema, created_at, updated_at, is_default
                     FROM user_profiles WHERE profile_type = ?1",
                )?;
                stmt.query_map(params![t], map_row)?.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, profile_name, profile_type, is_default, field_schema, created_at, updated_at, is_default
                     FROM user_profiles",
                )?;
                stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    pub async fn delete_profile(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.write().await;
        let affected = conn.execute("DELETE FROM user_profiles WHERE id = ?1", params![id])?;
        drop(conn);

        self.audit(
            AuditEntry::new("pii.profile_deleted", Actor::system(), "delete_profile", Compliance::pii("pii"))
                .with_resource(Resource::new("profile", id))
                .with_detail("existed", affected > 0),
        );
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub async fn get_default_profile(&self, profile_type: &str) -> Result<Profile, StoreError> {
        let conn = self.conn.read().await;
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM user_profiles WHERE profile_type = ?1 AND is_default = 1",
                params![profile_type],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);
        let id = id.ok_or_else(|| StoreError::NotFound(format!("default:{profile_type}")))?;
        self.retrieve_profile(&id).await
    }

    /// Atomically clears any other default of the same type before marking
    /// `id` as the new default.
    pub async fn set_default_profile(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.write().await;
        let tx = conn.transaction()?;
        let profile_type: Option<String> = tx
            .query_row("SELECT profile_type FROM user_profiles WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        let profile_type = profile_type.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        tx.execute(
            "UPDATE user_profiles SET is_default = 0 WHERE profile_type = ?1",
            params![profile_type],
        )?;
        tx.execute("UPDATE user_profiles SET is_default = 1 WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_dir_owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_dir_owner_only(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
