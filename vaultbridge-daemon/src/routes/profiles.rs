//! `/api/profiles` — PII profile CRUD. Unlike credentials, profile data is
//! returned over the daemon's own API: these are user-facing records, not
//! secrets destined only for a container's memory.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use vaultbridge_store::{NewProfile, StoreError};

use crate::state::{err, err500, Shared};

#[derive(Deserialize)]
pub struct StoreProfileReq {
    pub id: String,
    pub profile_name: String,
    pub profile_type: String,
    #[serde(default)]
    pub field_schema: serde_json::Value,
    pub data: serde_json::Value,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub profile_type: Option<String>,
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

pub async fn store_profile(State(state): State<Shared>, Json(req): Json<StoreProfileReq>) -> impl IntoResponse {
    let new = NewProfile {
        id: req.id.clone(),
        profile_name: req.profile_name,
        profile_type: req.profile_type,
        field_schema: req.field_schema,
        data: req.data,
        is_default: req.is_default,
    };
    match state.store.store_profile(new).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!({"id": req.id, "status": "stored"}))).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

pub async fn retrieve_profile(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.retrieve_profile(&id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

pub async fn list_profiles(State(state): State<Shared>, Query(q): Query<ListQuery>) -> impl IntoResponse {
    match state.store.list_profiles(q.profile_type.as_deref()).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

pub async fn delete_profile(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.delete_profile(&id).await {
        Ok(()) => Json(serde_json::json!({"id": id, "status": "deleted"})).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

pub async fn get_default_profile(State(state): State<Shared>, Path(profile_type): Path<String>) -> impl IntoResponse {
    match state.store.get_default_profile(&profile_type).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

pub async fn set_default_profile(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.set_default_profile(&id).await {
        Ok(()) => Json(serde_json::json!({"id": id, "status": "default"})).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}
