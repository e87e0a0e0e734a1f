//! `/api/credentials` — never returns a decrypted token over HTTP. The only
//! path a plaintext credential travels is store -> secret-injection pipeline
//! -> a container's process memory; admin callers get metadata only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use vaultbridge_store::{NewCredential, Provider, StoreError};

use crate::state::{err, err500, Shared};

#[derive(Deserialize)]
pub struct StoreCredentialReq {
    pub id: String,
    pub provider: String,
    pub token: String,
    pub display_name: String,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub provider: Option<String>,
}

fn store_error_response(e: StoreError) -> (StatusCode, Json<crate::state::ApiError>) {
    match e {
        StoreError::NotFound(_) => crate::state::err_with(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Expired(_) => crate::state::err_with(StatusCode::GONE, e.to_string()),
        StoreError::InvalidCredential(_) => err(e.to_string()),
        StoreError::Locked => crate::state::err_with(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        StoreError::Decryption(_) | StoreError::Io(_) => err500(e.to_string()),
    }
}

pub async fn store_credential(State(state): State<Shared>, Json(req): Json<StoreCredentialReq>) -> impl IntoResponse {
    let provider = match Provider::parse(&req.provider) {
        Ok(p) => p,
        Err(e) => return err(e.to_string()).into_response(),
    };

    let new = NewCredential {
        id: req.id.clone(),
        provider,
        token: req.token,
        display_name: req.display_name,
        created_at: Utc::now(),
        expires_at: req.expires_at,
        tags: req.tags,
    };

    match state.store.store_credential(new).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!({"id": req.id, "status": "stored"}))).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

pub async fn list_credentials(State(state): State<Shared>, Query(q): Query<ListQuery>) -> impl IntoResponse {
    let provider = match q.provider.as_deref().map(Provider::parse).transpose() {
        Ok(p) => p,
        Err(e) => return err(e.to_string()).into_response(),
    };
    match state.store.list_credentials(provider).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

pub async fn delete_credential(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.delete_credential(&id).await {
        Ok(()) => Json(serde_json::json!({"id": id, "status": "deleted"})).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}
