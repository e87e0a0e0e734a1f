//! `/api/auth` — API-key management (admin scope) and `whoami` (read scope).
//! Newly minted keys are returned in plaintext exactly once, at creation;
//! only the hash is ever persisted.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::auth::{self, ApiKeyEntry, AuthContext, Scope};
use crate::state::{err, Shared};

#[derive(Deserialize)]
pub struct CreateKeyReq {
    pub name: String,
    pub scopes: Vec<Scope>,
}

pub async fn create_key(State(state): State<Shared>, Json(req): Json<CreateKeyReq>) -> impl IntoResponse {
    let plaintext = auth::generate_api_key();
    let hash = hex::encode(auth::hash_api_key(&plaintext));
    let id = auth::generate_key_id();

    let entry = ApiKeyEntry {
        id: id.clone(),
        name: req.name,
        key_hash: hash,
        scopes: req.scopes,
        created_at: chrono::Utc::now().to_rfc3339(),
        active: true,
        last_used: None,
    };

    let mut store = state.api_keys.write().await;
    store.add(entry);
    if let Err(e) = store.save(&state.api_keys_path) {
        return err(e).into_response();
    }
    drop(store);

    (StatusCode::CREATED, Json(serde_json::json!({"id": id, "api_key": plaintext}))).into_response()
}

pub async fn list_keys(State(state): State<Shared>) -> impl IntoResponse {
    let store = state.api_keys.read().await;
    Json(store.list_info()).into_response()
}

pub async fn deactivate_key(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    let mut store = state.api_keys.write().await;
    if !store.deactivate(&id) {
        return err(format!("no such key: {id}")).into_response();
    }
    if let Err(e) = store.save(&state.api_keys_path) {
        return err(e).into_response();
    }
    Json(serde_json::json!({"id": id, "status": "deactivated"})).into_response()
}

pub async fn whoami(ctx: Option<Extension<AuthContext>>) -> impl IntoResponse {
    match ctx {
        Some(Extension(ctx)) => Json(serde_json::json!({
            "key_id": ctx.key_id,
            "key_name": ctx.key_name,
            "scopes": ctx.scopes,
        }))
        .into_response(),
        None => Json(serde_json::json!({"key_id": null, "key_name": null, "scopes": ["admin"], "mode": "unauthenticated"}))
            .into_response(),
    }
}
