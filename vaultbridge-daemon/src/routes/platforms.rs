//! `/api/adapters/:platform` — uniform lifecycle and messaging routes over
//! whichever connector `AdapterRegistry::get` resolves to.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use vaultbridge_adapters::{AdapterError, AdapterErrorCode, Message, Target};

use crate::state::{err, err_with, Shared};

fn adapter_error_response(e: AdapterError) -> (StatusCode, Json<crate::state::ApiError>) {
    let status = match e.code {
        AdapterErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
        AdapterErrorCode::InvalidTarget | AdapterErrorCode::ValidationError => StatusCode::BAD_REQUEST,
        AdapterErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AdapterErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        AdapterErrorCode::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
        AdapterErrorCode::NetworkError | AdapterErrorCode::PlatformError => StatusCode::BAD_GATEWAY,
    };
    err_with(status, e.to_string())
}

pub async fn list(State(state): State<Shared>) -> impl IntoResponse {
    Json(state.adapters.platforms()).into_response()
}

pub async fn initialize(State(state): State<Shared>, Path(platform): Path<String>, Json(config): Json<Value>) -> impl IntoResponse {
    let connector = match state.adapters.get(&platform) {
        Ok(c) => c,
        Err(e) => return err(e.to_string()).into_response(),
    };
    match connector.initialize(config).await {
        Ok(()) => Json(serde_json::json!({"platform": platform, "status": "initialized"})).into_response(),
        Err(e) => adapter_error_response(e).into_response(),
    }
}

pub async fn start(State(state): State<Shared>, Path(platform): Path<String>) -> impl IntoResponse {
    let connector = match state.adapters.get(&platform) {
        Ok(c) => c,
        Err(e) => return err(e.to_string()).into_response(),
    };
    match connector.start().await {
        Ok(()) => {
            state.adapters.on_started(&platform);
            Json(serde_json::json!({"platform": platform, "status": "running"})).into_response()
        }
        Err(e) => adapter_error_response(e).into_response(),
    }
}

pub async fn shutdown(State(state): State<Shared>, Path(platform): Path<String>) -> impl IntoResponse {
    let connector = match state.adapters.get(&platform) {
        Ok(c) => c,
        Err(e) => return err(e.to_string()).into_response(),
    };
    match connector.shutdown().await {
        Ok(()) => Json(serde_json::json!({"platform": platform, "status": "stopped"})).into_response(),
        Err(e) => adapter_error_response(e).into_response(),
    }
}

#[derive(Deserialize)]
pub struct SendReq {
    pub target: Target,
    pub message: Message,
}

pub async fn send(State(state): State<Shared>, Path(platform): Path<String>, Json(req): Json<SendReq>) -> impl IntoResponse {
    let connector = match state.adapters.get(&platform) {
        Ok(c) => c,
        Err(e) => return err(e.to_string()).into_response(),
    };
    match connector.send_message(&req.target, &req.message).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => adapter_error_response(e).into_response(),
    }
}

pub async fn health(State(state): State<Shared>, Path(platform): Path<String>) -> impl IntoResponse {
    let connector = match state.adapters.get(&platform) {
        Ok(c) => c,
        Err(e) => return err(e.to_string()).into_response(),
    };
    Json(connector.health_check().await).into_response()
}

pub async fn metrics(State(state): State<Shared>, Path(platform): Path<String>) -> impl IntoResponse {
    let connector = match state.adapters.get(&platform) {
        Ok(c) => c,
        Err(e) => return err(e.to_string()).into_response(),
    };
    Json(connector.metrics()).into_response()
}

pub async fn capabilities(State(state): State<Shared>, Path(platform): Path<String>) -> impl IntoResponse {
    let connector = match state.adapters.get(&platform) {
        Ok(c) => c,
        Err(e) => return err(e.to_string()).into_response(),
    };
    Json(connector.capabilities()).into_response()
}
