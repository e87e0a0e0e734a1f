//! VaultBridge bridge daemon: wires the encrypted store, the scoped
//! container client, and the platform adapter registry behind one
//! rate-limited, API-key-authenticated HTTP surface.

mod adapters;
mod auth;
mod config;
mod middleware;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware as axum_middleware;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use zeroize::Zeroizing;

use vaultbridge_audit::chain::IntegrityChainSink;
use vaultbridge_audit::FileAuditSink;
use vaultbridge_container::{Scope as ContainerScope, ScopeSet, ScopedClient, SecretInjectionPipeline};
use vaultbridge_crypto::{entropy, kdf, salt::SaltStore};
use vaultbridge_store::Store;

use adapters::AdapterRegistry;
use auth::{ApiKeyEntry, ApiKeyStore, Scope};
use config::Config;
use state::{AppState, RateLimiter};

/// Loads the on-disk key registry, seeding a bootstrap admin key from
/// `VAULTBRIDGE_API_KEY`/`VAULTBRIDGE_API_KEY_HASH` on a fresh install.
/// An empty registry with no bootstrap material leaves every endpoint
/// open — a deliberate dev-mode escape hatch, logged loudly.
fn bootstrap_api_keys(data_dir: &str) -> (ApiKeyStore, String) {
    let path = format!("{data_dir}/api-keys.json");
    let mut store = ApiKeyStore::load(&path);

    if !store.keys.is_empty() {
        let active = store.keys.iter().filter(|k| k.active).count();
        let admins = store.keys.iter().filter(|k| k.active && k.scopes.contains(&Scope::Admin)).count();
        tracing::info!(total = store.keys.len(), active, admins, "loaded API keys");
        return (store, path);
    }

    if let Some(hash) = config::resolve_bootstrap_hash() {
        let entry = ApiKeyEntry {
            id: "vbk_bootstrap".to_string(),
            name: "bootstrap-admin".to_string(),
            key_hash: hex::encode(hash),
            scopes: vec![Scope::Admin],
            created_at: chrono::Utc::now().to_rfc3339(),
            active: true,
            last_used: None,
        };
        store.add(entry);
        if let Err(e) = store.save(&path) {
            tracing::error!("failed to save bootstrap key: {}", e);
        }
        tracing::info!("created bootstrap admin key from environment");
    } else {
        tracing::warn!("no API keys configured — dev mode (all endpoints open)");
    }

    (store, path)
}

/// Derives the master key for the encrypted store from host entropy and
/// the per-install salt, creating the salt file on first run.
fn derive_key(dbpath: &std::path::Path) -> Zeroizing<[u8; 32]> {
    let salt = SaltStore::for_database(dbpath).load_or_create().expect("failed to load or create salt");
    let host_entropy = entropy::collect();
    kdf::derive_master_key(&host_entropy, &salt).expect("key derivation failed")
}

/// Best-effort connection to the container engine. A missing or
/// unreachable Docker socket is not fatal — the daemon still serves
/// credential/profile/adapter routes, it just refuses container-launch
/// requests with a 503 until an engine is reachable.
fn connect_container_client(docker_socket: Option<&str>) -> Option<SecretInjectionPipeline> {
    let scopes = ScopeSet::new([ContainerScope::Create, ContainerScope::Exec, ContainerScope::Remove]);
    match ScopedClient::connect(docker_socket, scopes) {
        Ok(client) => Some(SecretInjectionPipeline::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "container engine unavailable at startup — container routes will return 503");
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let cfg = Config::from_env();

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "vaultbridge_daemon=info,tower_http=info".into());
    if cfg.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).with_target(true).with_thread_ids(true).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    std::fs::create_dir_all(&cfg.data_dir).expect("failed to create data directory");

    let audit_path = format!("{}/vaultbridge-audit.jsonl", cfg.data_dir);
    let file_sink: std::sync::Arc<dyn vaultbridge_audit::AuditSinkSync> = Arc::new(FileAuditSink::new(&audit_path));
    let chained: std::sync::Arc<dyn vaultbridge_audit::AuditSinkSync> = Arc::new(IntegrityChainSink::new(file_sink));
    vaultbridge_audit::set_default_logger(Some(chained.clone()));

    let dbpath = cfg.dbpath();
    let master_key = derive_key(&dbpath);
    let store = Store::open(&dbpath, master_key).await.expect("failed to open encrypted store");
    store.set_audit_logger(Some(chained));

    let container = connect_container_client(cfg.docker_socket.as_deref());

    let (api_key_store, api_keys_path) = bootstrap_api_keys(&cfg.data_dir);

    let state: state::Shared = Arc::new(AppState {
        store,
        container,
        adapters: AdapterRegistry::new(),
        api_keys: RwLock::new(api_key_store),
        api_keys_path,
        rate_limiter: RateLimiter::new(cfg.rate_limit_rps, cfg.rate_limit_burst),
    });

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_state.rate_limiter.cleanup_stale().await;
        }
    });

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = routes::router()
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::auth_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .layer(cors)
        .with_state(state);

    tracing::info!(port = cfg.port, rps = cfg.rate_limit_rps, burst = cfg.rate_limit_burst, "starting VaultBridge daemon");
    tracing::info!(data_dir = %cfg.data_dir, "data directory");

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.expect("server error");
}
