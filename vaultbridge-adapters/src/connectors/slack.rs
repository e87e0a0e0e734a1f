//! Slack connector: `POST chat.postMessage` with bearer
//! auth, thread support via `thread_ts`, `auth.test`/`conversations.info`
//! for health checks. RTM is declared unimplemented; webhooks are the
//! supported inbound path.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::base::{BaseAdapter, HealthStatus, Metrics, PlatformConnector};
use crate::capabilities::Capabilities;
use crate::error::AdapterError;
use crate::message::{validate_message, ExternalEvent, Message, SendResult, Target};

const API_BASE: &str = "https://slack.com/api";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub fn default_capabilities() -> Capabilities {
    Capabilities { read: true, write: true, media: true, reactions: true, threads: true, edit: true, delete: true, typing: true, read_receipts: false }
}

struct SlackConfig {
    bot_token: String,
}

pub struct SlackConnector {
    base: BaseAdapter,
    http: reqwest::Client,
    config: RwLock<Option<SlackConfig>>,
}

impl Default for SlackConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SlackConnector {
    pub fn new() -> Self {
        Self {
            base: BaseAdapter::new(),
            http: reqwest::Client::builder().timeout(HTTP_TIMEOUT).build().expect("reqwest client"),
            config: RwLock::new(None),
        }
    }

    /// Declared unimplemented — webhooks are the supported inbound path
    /// for this connector.
    pub async fn rtm_connect(&self) -> Result<(), AdapterError> {
        Err(AdapterError::platform_error("slack RTM is not implemented"))
    }

    fn map_slack_error(error: &str) -> AdapterError {
        match error {
            "rate_limited" | "ratelimited" => AdapterError::rate_limited(error, Duration::from_secs(1)),
            "invalid_auth" | "not_authed" | "token_revoked" | "account_inactive" => AdapterError::auth_failed(error),
            "channel_not_found" | "not_in_channel" => AdapterError::invalid_target(error),
            _ => AdapterError::platform_error(error),
        }
    }
}

#[async_trait]
impl PlatformConnector for SlackConnector {
    fn platform(&self) -> &'static str {
        "slack"
    }

    fn capabilities(&self) -> Capabilities {
        default_capabilities()
    }

    fn version(&self) -> &'static str {
        "1.0"
    }

    async fn initialize(&self, config: Value) -> Result<(), AdapterError> {
        let bot_token = config
            .get("bot_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdapterError::validation_error("slack config requires a non-empty bot_token"))?
            .to_string();
        *self.config.write().await = Some(SlackConfig { bot_token });
        self.base.transition(crate::base::AdapterState::Initialized).await
    }

    async fn start(&self) -> Result<(), AdapterError> {
        self.base.transition(crate::base::AdapterState::Running).await
    }

    async fn shutdown(&self) -> Result<(), AdapterError> {
        self.base.transition(crate::base::AdapterState::Stopped).await
    }

    async fn send_message(&self, target: &Target, message: &Message) -> Result<SendResult, AdapterError> {
        self.base.require_running().await?;
        let mut message = message.clone();
        validate_message(&mut message)?;

        let token = {
            let guard = self.config.read().await;
            guard.as_ref().ok_or_else(|| AdapterError::platform_error("slack connector not configured"))?.bot_token.clone()
        };

        let mut body = serde_json::json!({
            "channel": target.channel_id,
            "text": message.content,
        });
        if let Some(thread) = &target.thread_id {
            body["thread_ts"] = Value::String(thread.clone());
        }

        let resp = self
            .http
            .post(format!("{API_BASE}/chat.postMessage"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                self.base.record_error();
                AdapterError::from(e)
            })?;

        let payload: Value = resp.json().await.map_err(AdapterError::from)?;
        if payload.get("ok").and_then(Value::as_bool) == Some(true) {
            self.base.record_sent();
            self.base.touch_message().await;
            let ts = payload.get("ts").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok(SendResult { platform_message_id: ts })
        } else {
            self.base.record_error();
            let error = payload.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            Err(Self::map_slack_error(error))
        }
    }

    async fn receive_event(&self, _event: ExternalEvent) -> Result<(), AdapterError> {
        self.base.require_running().await?;
        self.base.record_received();
        self.base.touch_message().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        let token = self.config.read().await.as_ref().map(|c| c.bot_token.clone());
        let Some(token) = token else {
            return self.base.health(false, None, Some("not configured".into())).await;
        };
        let result = self.http.get(format!("{API_BASE}/auth.test")).bearer_auth(token).send().await;
        let latency = start.elapsed();
        self.base.touch_ping().await;
        match result {
            Ok(resp) if resp.status().is_success() => self.base.health(true, Some(latency), None).await,
            Ok(resp) => self.base.health(false, Some(latency), Some(format!("status {}", resp.status()))).await,
            Err(e) => self.base.health(false, Some(latency), Some(e.to_string())).await,
        }
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
        assert!(caps.threads);
        assert!(caps.reactions);
        assert!(!caps.read_receipts);
    }

    #[test]
    fn maps_known_slack_errors_to_the_unified_taxonomy() {
        assert_eq!(SlackConnector::map_slack_error("invalid_auth").code, crate::error::AdapterErrorCode::AuthFailed);
        assert_eq!(SlackConnector::map_slack_error("channel_not_found").code, crate::error::AdapterErrorCode::InvalidTarget);
        assert_eq!(SlackConnector::map_slack_error("rate_limited").code, crate::error::AdapterErrorCode::RateLimited);
    }

    #[tokio::test]
    async fn initialize_rejects_empty_bot_token() {
        let connector = SlackConnector::new();
        let err = connector.initialize(serde_json::json!({"bot_token": ""})).await.unwrap_err();
        assert_eq!(err.code, crate::error::AdapterErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn send_before_running_fails_platform_error() {
        let connector = SlackConnector::new();
        let target = Target { channel_id: "C1".into(), thread_id: None };
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
