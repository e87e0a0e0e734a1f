//! Rate limiting and API-key authentication middleware, applied in that
//! order so an unauthenticated flood never reaches the auth check.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Json;

use crate::auth::{self, AuthContext};
use crate::state::{err_with, Shared};

pub async fn rate_limit_middleware(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> impl IntoResponse {
    if req.uri().path() == "/health" {
        return next.run(req).await.into_response();
    }

    if !state.rate_limiter.check(addr.ip()).await {
        tracing::warn!(ip = %addr.ip(), path = %req.uri().path(), "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "1")],
            Json(crate::state::ApiError { error: "rate limit exceeded".into() }),
        )
            .into_response();
    }

    next.run(req).await.into_response()
}

pub async fn auth_middleware(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> impl IntoResponse {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();

    let required = match auth::required_scope(&path, &method) {
        None => return next.run(req).await.into_response(),
        Some(scope) => scope,
    };

    let store = state.api_keys.read().await;
    if store.keys.is_empty() {
        return next.run(req).await.into_response();
    }

    let auth_header = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);

    let Some(val) = auth_header.filter(|v| v.starts_with("Bearer ")) else {
        drop(store);
        return err_with(StatusCode::UNAUTHORIZED, "missing Authorization header (use: Bearer <api-key>)").into_response();
    };

    let provided_hash = auth::hash_api_key(&val[7..]);
    let entry = match store.authenticate(&provided_hash) {
        Some(entry) => entry.clone(),
        None => {
            drop(store);
            tracing::warn!(ip = %addr.ip(), path = %path, "invalid API key");
            return err_with(StatusCode::UNAUTHORIZED, "authentication failed").into_response();
        }
    };
    drop(store);

    if !auth::has_scope(&entry.scopes, &required) {
        tracing::warn!(ip = %addr.ip(), key_id = %entry.id, required = %required.as_str(), "insufficient scope");
        return err_with(StatusCode::FORBIDDEN, format!("insufficient scope: requires '{}' permission", required.as_str()))
            .into_response();
    }

    let key_id = entry.id.clone();
    let state2 = state.clone();
    tokio::spawn(async move {
        let mut s = state2.api_keys.write().await;
        s.touch(&key_id);
        let _ = s.save(&state2.api_keys_path);
    });

    req.extensions_mut().insert(AuthContext { key_id: entry.id, key_name: entry.name, scopes: entry.scopes });
    next.run(req).await.into_response()
}
