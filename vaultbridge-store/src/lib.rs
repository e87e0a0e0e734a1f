//! # vaultbridge-store
//!
//! The hardware-bound encrypted store: credentials, Matrix
//! refresh tokens, and PII profiles, backed by SQLCipher via `rusqlite` with
//! an additional XChaCha20-Poly1305 layer over every secret column.
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use vaultbridge_crypto::{entropy, salt::SaltStore, kdf};
//! use vaultbridge_store::{Store, NewCredential, Provider};
//! use chrono::Utc;
//!
//! let dbpath = "/var/lib/vaultbridge/store.db";
//! let salt = SaltStore::for_database(dbpath).load_or_create()?;
//! let key = kdf::derive_master_key(&entropy::collect(), &salt)?;
//!
//! let store = Store::open(dbpath, key).await?;
//! store.store_credential(NewCredential {
//!     id: "k1".into(),
//!     provider: Provider::Openai,
//!     token: "sk-live-...".into(),
//!     display_name: "prod key".into(),
//!     created_at: Utc::now(),
//!     expires_at: None,
//!     tags: vec![],
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod retry;
mod store;
pub mod types;

pub use error::{RetryError, StoreError};
pub use store::Store;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use vaultbridge_audit::InMemoryAuditSink;

    async fn open_test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dbpath = dir.path().join("store.db");
        let key = vaultbridge_crypto::kdf::derive_master_key(b"test-entropy", b"test-salt-0123456789").unwrap();
        let store = Store::open(&dbpath, key).await.unwrap();
        (store, dir)
    }

    fn cred(id: &str, provider: Provider, token: &str) -> NewCredential {
        NewCredential {
            id: id.into(),
            provider,
            token: token.into(),
            display_name: "test".into(),
            created_at: Utc::now(),
            expires_at: None,
            tags: vec![],
        }
    }

    // store, retrieve, delete, retrieve -> not_found.
    #[tokio::test]
    async fn store_retrieve_delete_roundtrip() {
        let (store, _dir) = open_test_store().await;
        store.store_credential(cred("k1", Provider::Openai, "sk-test-abc")).await.unwrap();

        let got = store.retrieve_credential("k1").await.unwrap();
        assert_eq!(got.token, "sk-test-abc");

        store.delete_credential("k1").await.unwrap();
        let err = store.retrieve_credential("k1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    // expired credential.
    #[tokio::test]
    async fn expired_credential_rejected_on_read() {
        let (store, _dir) = open_test_store().await;
        let mut c = cred("k2", Provider::Openai, "sk-expired");
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        store.store_credential(c).await.unwrap();

        let err = store.retrieve_credential("k2").await.unwrap_err();
        assert!(matches!(err, StoreError::Expired(_)));
    }

    // list filtered by provider.
    #[tokio::test]
    async fn list_filtered_by_provider() {
        let (store, _dir) = open_test_store().await;
        store.store_credential(cred("o1", Provider::Openai, "a")).await.unwrap();
        store.store_credential(cred("o2", Provider::Openai, "b")).await.unwrap();
        store.store_credential(cred("a1", Provider::Anthropic, "c")).await.unwrap();

        let openai = store.list_credentials(Some(Provider::Openai)).await.unwrap();
        assert_eq!(openai.len(), 2);

        let all = store.list_credentials(None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn close_is_idempotent_to_call_once() {
        let (store, _dir) = open_test_store().await;
        store.store_credential(cred("k1", Provider::Openai, "sk-unique-marker-xyz")).await.unwrap();
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_reencrypts_with_fresh_nonce() {
        let (store, _dir) = open_test_store().await;
        store.store_credential(cred("k1", Provider::Openai, "first")).await.unwrap();
        store.store_credential(cred("k1", Provider::Openai, "second")).await.unwrap();
        let got = store.retrieve_credential("k1").await.unwrap();
        assert_eq!(got.token, "second");
    }

    // Invariant 6: at most one default profile per type.
    #[tokio::test]
    async fn profile_default_uniqueness() {
        let (store, _dir) = open_test_store().await;
        let schema = serde_json::json!({"fields": ["email"]});

        store
            .store_profile(NewProfile {
                id: "p1".into(),
                profile_name: "first".into(),
                profile_type: "support".into(),
                field_schema: schema.clone(),
                data: serde_json::json!({"email": "a@example.com"}),
                is_default: true,
            })
            .await
            .unwrap();
        store
            .store_profile(NewProfile {
                id: "p2".into(),
                profile_name: "second".into(),
                profile_type: "support".into(),
                field_schema: schema,
                data: serde_json::json!({"email": "b@example.com"}),
                is_default: true,
            })
            .await
            .unwrap();

        let profiles = store.list_profiles(Some("support")).await.unwrap();
        let defaults: Vec<_> = profiles.iter().filter(|p| p.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, "p2");

        let default = store.get_default_profile("support").await.unwrap();
        assert_eq!(default.id, "p2");
    }

    #[tokio::test]
    async fn set_default_profile_clears_previous_atomically() {
        let (store, _dir) = open_test_store().await;
        let schema = serde_json::json!({});
        for id in ["p1", "p2"] {
            store
                .store_profile(NewProfile {
                    id: id.into(),
                    profile_name: id.into(),
                    profile_type: "billing".into(),
                    field_schema: schema.clone(),
                    data: serde_json::json!({}),
                    is_default: id == "p1",
                })
                .await
                .unwrap();
        }
        store.set_default_profile("p2").await.unwrap();
        let profiles = store.list_profiles(Some("billing")).await.unwrap();
        let defaults: Vec<_> = profiles.iter().filter(|p| p.is_default).map(|p| p.id.clone()).collect();
        assert_eq!(defaults, vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn audit_hook_is_silent_without_a_logger() {
        let (store, _dir) = open_test_store().await;
        store.set_audit_logger(None);
        store.store_credential(cred("k1", Provider::Openai, "x")).await.unwrap();
        let _ = store.retrieve_credential("k1").await.unwrap();
    }

    #[tokio::test]
    async fn audit_hook_records_retrieval_attempts() {
        let (store, _dir) = open_test_store().await;
        let sink = Arc::new(InMemoryAuditSink::new());
        store.set_audit_logger(Some(sink.clone()));

        store.store_credential(cred("k1", Provider::Openai, "x")).await.unwrap();
        let _ = store.retrieve_credential("k1").await;
        let _ = store.retrieve_credential("missing").await;

        let entries = sink.entries();
        assert!(entries.iter().any(|e| e.event_type == "key.access" && e.compliance.severity == vaultbridge_audit::Severity::Low));
    }

    #[tokio::test]
    async fn unknown_provider_rejected_at_boundary() {
        assert!(Provider::parse("cohere").is_err());
    }
}
