//! `/api/containers` — launches a hardened, secret-bearing container
//! through the injection pipeline and exposes lifecycle/inspection
//! operations on it. `launch` is the one HTTP handler in this daemon that
//! touches a decrypted credential, and it only ever hands that plaintext to
//! `SecretInjectionPipeline::launch`, never back out over the response.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use vaultbridge_container::{ContainerError, InjectionRequest, InjectionStrategy, PiiMountSpec};
use vaultbridge_store::StoreError;

use crate::state::{err, err500, err_with, Shared};

#[derive(Deserialize)]
pub struct LaunchReq {
    pub session_id: String,
    pub image: String,
    #[serde(default)]
    pub credential_ids: Vec<String>,
    #[serde(default)]
    pub pii_profile_id: Option<String>,
    #[serde(default)]
    pub env_at_start: bool,
}

fn container_error_response(e: ContainerError) -> (StatusCode, Json<crate::state::ApiError>) {
    match e {
        ContainerError::NotFound(_) => err_with(StatusCode::NOT_FOUND, e.to_string()),
        ContainerError::Conflict(_) => err_with(StatusCode::CONFLICT, e.to_string()),
        ContainerError::Auth(_) => err_with(StatusCode::UNAUTHORIZED, e.to_string()),
        ContainerError::ImageMissing(_) | ContainerError::ImageInvalid(_) | ContainerError::ScopeViolation(_) => err(e.to_string()),
        ContainerError::Timeout => err_with(StatusCode::GATEWAY_TIMEOUT, e.to_string()),
        _ => err500(e.to_string()),
    }
}

fn no_container_client() -> (StatusCode, Json<crate::state::ApiError>) {
    err_with(StatusCode::SERVICE_UNAVAILABLE, "container engine unavailable")
}

pub async fn launch(State(state): State<Shared>, Json(req): Json<LaunchReq>) -> impl IntoResponse {
    let Some(pipeline) = state.container.as_ref() else {
        return no_container_client().into_response();
    };

    let pii_mount = if req.pii_profile_id.is_some() { Some(PiiMountSpec::default()) } else { None };

    let injection = InjectionRequest {
        session_id: req.session_id.clone(),
        image: req.image,
        credential_ids: req.credential_ids,
        pii_mount,
        strategy: if req.env_at_start { InjectionStrategy::EnvAtStart } else { InjectionStrategy::Fd },
    };

    let store = &state.store;
    let result = pipeline
        .launch(injection, |id| async move {
            let cred = store.retrieve_credential(&id).await.map_err(store_error_to_container_error)?;
            let env_name = format!("{}_API_KEY", cred.provider.as_str().to_uppercase());
            Ok((env_name, cred.token))
        })
        .await;

    match result {
        Ok(session) => {
            (StatusCode::CREATED, Json(serde_json::json!({"container_id": session.container_id, "session_id": session.session_id})))
                .into_response()
        }
        Err(e) => container_error_response(e).into_response(),
    }
}

fn store_error_to_container_error(e: StoreError) -> ContainerError {
    match e {
        StoreError::NotFound(id) => ContainerError::NotFound(id),
        other => ContainerError::Generic(other.to_string()),
    }
}

pub async fn list(State(state): State<Shared>) -> impl IntoResponse {
    let Some(pipeline) = state.container.as_ref() else {
        return no_container_client().into_response();
    };
    match pipeline.client().list_containers(true).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => container_error_response(e).into_response(),
    }
}

pub async fn inspect(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    let Some(pipeline) = state.container.as_ref() else {
        return no_container_client().into_response();
    };
    match pipeline.client().inspect_container(&id).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => container_error_response(e).into_response(),
    }
}

pub async fn stop(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    let Some(pipeline) = state.container.as_ref() else {
        return no_container_client().into_response();
    };
    match pipeline.client().remove_container(&id, false).await {
        Ok(()) => Json(serde_json::json!({"id": id, "status": "stopped"})).into_response(),
        Err(e) => container_error_response(e).into_response(),
    }
}

pub async fn remove(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    let Some(pipeline) = state.container.as_ref() else {
        return no_container_client().into_response();
    };
    match pipeline.client().remove_container(&id, true).await {
        Ok(()) => Json(serde_json::json!({"id": id, "status": "removed"})).into_response(),
        Err(e) => container_error_response(e).into_response(),
    }
}
