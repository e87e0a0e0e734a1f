//! Teams connector: OAuth client-credentials token
//! exchange against the tenant's token endpoint, proactive refresh when
//! `time_until_expiry < 5min` plus a background 30-minute refresh loop,
//! sends via Microsoft Graph, HMAC-SHA256 base64 webhook signature
//! verification in constant time.
//!
//! Token state machine:
//! `uninitialized -> valid -> refreshing -> valid`,
//! `refreshing -> invalid` on a failed refresh, `invalid` fails sends fast
//! with `auth_failed`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::base::{BaseAdapter, HealthStatus, Metrics, PlatformConnector};
use crate::capabilities::Capabilities;
use crate::error::AdapterError;
use crate::message::{validate_message, ExternalEvent, Message, SendResult, Target};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PROACTIVE_REFRESH_WINDOW: Duration = Duration::from_secs(5 * 60);
const REFRESH_LOOP_TICK: Duration = Duration::from_secs(30 * 60);

pub fn default_capabilities() -> Capabilities {
    Capabilities { read: true, write: true, media: true, reactions: false, threads: true, edit: true, delete: true, typing: false, read_receipts: false }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
    Uninitialized,
    Valid,
    Refreshing,
    Invalid,
}

struct TeamsConfig {
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

struct TokenData {
    state: TokenState,
    access_token: Option<String>,
    expires_at: Option<Instant>,
}

pub struct TeamsConnector {
    base: BaseAdapter,
    http: reqwest::Client,
    config: RwLock<Option<TeamsConfig>>,
    token: RwLock<TokenData>,
    shutdown: CancellationToken,
    token_endpoint_base: String,
}

impl Default for TeamsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl TeamsConnector {
    pub fn new() -> Self {
        Self {
            base: BaseAdapter::new(),
            http: reqwest::Client::builder().timeout(HTTP_TIMEOUT).build().expect("reqwest client"),
            config: RwLock::new(None),
            token: RwLock::new(TokenData { state: TokenState::Uninitialized, access_token: None, expires_at: None }),
            shutdown: CancellationToken::new(),
            token_endpoint_base: "https://login.microsoftonline.com".to_string(),
        }
    }

    /// Points token fetches at a different host. Exists for tests driving
    /// the connector against a mock token endpoint instead of the real
    /// Microsoft login host.
    #[cfg(test)]
    pub(crate) fn with_token_endpoint_base(mut self, base: String) -> Self {
        self.token_endpoint_base = base;
        self
    }

    pub async fn token_state(&self) -> TokenState {
        self.token.read().await.state
    }

    async fn fetch_token(&self) -> Result<(), AdapterError> {
        let (tenant_id, client_id, client_secret) = {
            let guard = self.config.read().await;
            let cfg = guard.as_ref().ok_or_else(|| AdapterError::platform_error("teams connector not configured"))?;
            (cfg.tenant_id.clone(), cfg.client_id.clone(), cfg.client_secret.clone())
        };

        {
            let mut token = self.token.write().await;
            token.state = TokenState::Refreshing;
        }

        let url = format!("{}/{tenant_id}/oauth2/v2.0/token", self.token_endpoint_base);
        let params = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", "https://graph.microsoft.com/.default"),
        ];

        let result = self.http.post(&url).form(&params).send().await;
        let outcome = async {
            let resp = result?;
            if !resp.status().is_success() {
                return Err(AdapterError::auth_failed(format!("token endpoint returned {}", resp.status())));
            }
            let body: Value = resp.json().await?;
            let access_token =
                body.get("access_token").and_then(Value::as_str).ok_or_else(|| AdapterError::auth_failed("no access_token in response"))?.to_string();
            let expires_in = body.get("expires_in").and_then(Value::as_u64).unwrap_or(3600);
            Ok::<_, AdapterError>((access_token, expires_in))
        }
        .await;

        let mut token = self.token.write().await;
        match outcome {
            Ok((access_token, expires_in)) => {
                token.access_token = Some(access_token);
                token.expires_at = Some(Instant::now() + Duration::from_secs(expires_in));
                token.state = TokenState::Valid;
                Ok(())
            }
            Err(e) => {
                token.state = TokenState::Invalid;
                token.access_token = None;
                Err(e)
            }
        }
    }

    /// Refreshes proactively if `time_until_expiry < 5min`, or if there is
    /// no valid token at all.
    async fn ensure_fresh_token(&self) -> Result<String, AdapterError> {
        let needs_refresh = {
            let token = self.token.read().await;
            match token.state {
                TokenState::Invalid => return Err(AdapterError::auth_failed("teams token is invalid")),
                TokenState::Uninitialized => true,
                TokenState::Refreshing => true,
                TokenState::Valid => token.expires_at.map(|exp| exp.saturating_duration_since(Instant::now()) < PROACTIVE_REFRESH_WINDOW).unwrap_or(true),
            }
        };
        if needs_refresh {
            self.fetch_token().await?;
        }
        let token = self.token.read().await;
        token.access_token.clone().ok_or_else(|| AdapterError::auth_failed("teams token unavailable"))
    }

    /// Verifies a Teams webhook's HMAC-SHA256 base64 signature in constant
    /// time against `secret`.
    pub fn verify_webhook_signature(body: &[u8], signature_b64: &str, secret: &str) -> bool {
        let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => return false,
        };
        mac.update(body);
        let expected = mac.finalize().into_bytes();
        let expected_b64 = base64::engine::general_purpose::STANDARD.encode(expected);
        let expected_bytes = expected_b64.as_bytes();
        let provided_bytes = signature_b64.as_bytes();
        expected_bytes.len() == provided_bytes.len() && bool::from(expected_bytes.ct_eq(provided_bytes))
    }
}

/// Spawns the background token refresh loop on a 30-minute tick
///, exiting promptly when `connector.shutdown()` is
/// called. Takes `Arc<TeamsConnector>` rather than being a `&self` method
/// on the trait so the spawned task can own a clone independent of the
/// caller's borrow — callers (the adapter registry) invoke this once after
/// `start()` succeeds.
pub fn spawn_refresh_loop(connector: std::sync::Arc<TeamsConnector>) {
    let cancel = connector.shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REFRESH_LOOP_TICK);
        interval.tick().await; // first tick fires immediately; consume it
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {
                    if let Err(e) = connector.fetch_token().await {
                        tracing::warn!(error = %e, "teams background token refresh failed");
                    }
                }
            }
        }
    });
}

#[async_trait]
impl PlatformConnector for TeamsConnector {
    fn platform(&self) -> &'static str {
        "teams"
    }

    fn capabilities(&self) -> Capabilities {
        default_capabilities()
    }

    fn version(&self) -> &'static str {
        "1.0"
    }

    async fn initialize(&self, config: Value) -> Result<(), AdapterError> {
        let client_id = config.get("client_id").and_then(Value::as_str).unwrap_or_default().to_string();
        if client_id.is_empty() {
            return Err(AdapterError::validation_error("teams config requires a non-empty client_id"));
        }
        let tenant_id = config
            .get("tenant_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdapterError::validation_error("teams config requires a non-empty tenant_id"))?
            .to_string();
        let client_secret = config
            .get("client_secret")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdapterError::validation_error("teams config requires a non-empty client_secret"))?
            .to_string();

        *self.config.write().await = Some(TeamsConfig { tenant_id, client_id, client_secret });
        self.fetch_token().await?;
        self.base.transition(crate::base::AdapterState::Initialized).await
    }

    async fn start(&self) -> Result<(), AdapterError> {
        self.base.transition(crate::base::AdapterState::Running).await
    }

    async fn shutdown(&self) -> Result<(), AdapterError> {
        self.shutdown.cancel();
        self.base.transition(crate::base::AdapterState::Stopped).await
    }

    async fn send_message(&self, target: &Target, message: &Message) -> Result<SendResult, AdapterError> {
        self.base.require_running().await?;
        let mut message = message.clone();
        validate_message(&mut message)?;

        let token = self.ensure_fresh_token().await?;

        let path = if let Some(thread) = &target.thread_id {
            format!("{GRAPH_BASE}/teams/{}/channels/{thread}/messages", target.channel_id)
        } else {
            format!("{GRAPH_BASE}/chats/{}/messages", target.channel_id)
        };

        let resp = self
            .http
            .post(&path)
            .bearer_auth(token)
            .json(&serde_json::json!({ "body": { "content": message.content } }))
            .send()
            .await
            .map_err(|e| {
                self.base.record_error();
                AdapterError::from(e)
            })?;

        if !resp.status().is_success() {
            self.base.record_error();
            return Err(AdapterError::platform_error(format!("graph status {}", resp.status())));
        }

        let payload: Value = resp.json().await.map_err(AdapterError::from)?;
        self.base.record_sent();
        self.base.touch_message().await;
        let id = payload.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(SendResult { platform_message_id: id })
    }

    async fn receive_event(&self, _event: ExternalEvent) -> Result<(), AdapterError> {
        self.base.require_running().await?;
        self.base.record_received();
        self.base.touch_message().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        self.base.touch_ping().await;
        let valid = self.token_state().await == TokenState::Valid;
        self.base.health(valid, None, if valid { None } else { Some("token not valid".into()) }).await
    }

    fn metrics(&self) -> Metrics {
        self.base.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capability_set_matches_spec() {
        let caps = default_capabilities();
        assert!(!caps.reactions);
        assert!(!caps.typing);
    }

    // Initialize fails with an empty client_id.
    #[tokio::test]
    async fn initialize_fails_with_empty_client_id() {
        let connector = TeamsConnector::new();
        let err = connector
            .initialize(serde_json::json!({"client_id": "", "tenant_id": "t", "client_secret": "s"}))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::AdapterErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn initialize_fails_with_missing_tenant_id() {
        let connector = TeamsConnector::new();
        let err = connector.initialize(serde_json::json!({"client_id": "c", "client_secret": "s"})).await.unwrap_err();
        assert_eq!(err.code, crate::error::AdapterErrorCode::ValidationError);
    }

    #[test]
    fn webhook_signature_round_trips() {
        let body = b"teams webhook payload";
        let mut mac = Hmac::<Sha256>::new_from_slice(b"shared-secret").unwrap();
        mac.update(body);
        let sig = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        assert!(TeamsConnector::verify_webhook_signature(body, &sig, "shared-secret"));
        assert!(!TeamsConnector::verify_webhook_signature(body, &sig, "wrong-secret"));
    }

    #[tokio::test]
    async fn first_send_observes_token_then_refreshes_near_expiry() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "token-from-endpoint",
                "expires_in": 3600
            })))
            .mount(&mock_server)
            .await;

        let connector = TeamsConnector::new().with_token_endpoint_base(mock_server.uri());
        connector.initialize(serde_json::json!({"client_id": "c", "tenant_id": "test-tenant", "client_secret": "s"})).await.unwrap();

        assert_eq!(connector.token.read().await.access_token.as_deref(), Some("token-from-endpoint"));
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);

        let token = connector.ensure_fresh_token().await.unwrap();
        assert_eq!(token, "token-from-endpoint");
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1, "token not near expiry yet, no refresh expected");

        // Advance simulated time to within the 5-minute refresh window.
        connector.token.write().await.expires_at = Some(Instant::now() + Duration::from_secs(60));

        connector.ensure_fresh_token().await.unwrap();
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 2, "near-expiry token should trigger a refresh");
    }

    #[tokio::test]
    async fn send_before_initialize_fails_fast() {
        let connector = TeamsConnector::new();
        let target = Target { channel_id: "c1".into(), thread_id: None };
        let msg = Message {
            id: "m1".into(),
            message_type: None,
            content: "hi".into(),
            attachments: vec![],
            reply_to: None,
            timestamp: None,
            metadata: Default::default(),
            signature: None,
        };
        let err = connector.send_message(&target, &msg).await.unwrap_err();
        assert_eq!(err.code, crate::error::AdapterErrorCode::PlatformError);
    }
}
