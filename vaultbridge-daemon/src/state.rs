//! Shared process state and the per-IP token-bucket rate limiter.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use vaultbridge_container::SecretInjectionPipeline;
use vaultbridge_store::Store;

use crate::adapters::AdapterRegistry;
use crate::auth::ApiKeyStore;

pub struct AppState {
    pub store: Store,
    pub container: Option<SecretInjectionPipeline>,
    pub adapters: AdapterRegistry,
    pub api_keys: RwLock<ApiKeyStore>,
    pub api_keys_path: String,
    pub rate_limiter: RateLimiter,
}

pub type Shared = Arc<AppState>;

#[derive(Serialize, Clone)]
pub struct ApiError {
    pub error: String,
}

pub fn err(msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: msg.into() }))
}

pub fn err_with(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: msg.into() }))
}

pub fn err500(msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError { error: msg.into() }))
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    rps: f64,
    burst: u32,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(rps: f64, burst: u32) -> Self {
        Self { buckets: Mutex::new(HashMap::new()), rps, burst }
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let bucket = buckets.entry(ip).or_insert(TokenBucket { tokens: self.burst as f64, last_refill: now });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.burst as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub async fn cleanup_stale(&self) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill).as_secs() < 300);
    }
}
