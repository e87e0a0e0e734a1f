//! Route tables, one module per resource family.

pub mod auth;
pub mod containers;
pub mod credentials;
pub mod platforms;
pub mod profiles;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::Shared;

pub async fn health() -> &'static str {
    "ok"
}

pub fn router() -> Router<Shared> {
    Router::new()
        .route("/health", get(health))
        .route("/api/credentials", post(credentials::store_credential).get(credentials::list_credentials))
        .route("/api/credentials/:id", delete(credentials::delete_credential))
        .route("/api/profiles", post(profiles::store_profile).get(profiles::list_profiles))
        .route("/api/profiles/:id", get(profiles::retrieve_profile).delete(profiles::delete_profile))
        .route("/api/profiles/:id/default", post(profiles::set_default_profile))
        .route("/api/profiles/default/:profile_type", get(profiles::get_default_profile))
        .route("/api/containers", get(containers::list))
        .route("/api/containers/launch", post(containers::launch))
        .route("/api/containers/:id", get(containers::inspect).delete(containers::remove))
        .route("/api/containers/:id/stop", post(containers::stop))
        .route("/api/adapters", get(platforms::list))
        .route("/api/adapters/:platform/initialize", post(platforms::initialize))
        .route("/api/adapters/:platform/start", post(platforms::start))
        .route("/api/adapters/:platform/shutdown", post(platforms::shutdown))
        .route("/api/adapters/:platform/send", post(platforms::send))
        .route("/api/adapters/:platform/health", get(platforms::health))
        .route("/api/adapters/:platform/metrics", get(platforms::metrics))
        .route("/api/adapters/:platform/capabilities", get(platforms::capabilities))
        .route("/api/auth/keys", post(auth::create_key).get(auth::list_keys))
        .route("/api/auth/keys/:id", delete(auth::deactivate_key))
        .route("/api/auth/whoami", get(auth::whoami))
}
