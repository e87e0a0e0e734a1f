//! Discord connector: `POST channels/{id}/messages` with a
//! bot bearer token; HTTP 429 surfaces `rate_limited` with `retry_after`
//! parsed from the JSON body; `users/@me`/`gateway` for health checks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::base::{BaseAdapter, HealthStatus, Metrics, PlatformConnector};
use crate::capabilities::Capabilities;
use crate::error::AdapterError;
use crate::message::{validate_message, ExternalEvent, Message, SendResult, Target};

const API_BASE: &str = "https://discord.com/api/v10";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub fn default_capabilities() -> Capabilities {
    Capabilities { read: true, write: true, media: true, reactions: true, threads: true, edit: true, delete: true, typing: true, read_receipts: false }
}

struct DiscordConfig {
    bot_token: String,
}

pub struct DiscordConnector {
    base: BaseAdapter,
    http: reqwest::Client,
    config: RwLock<Option<DiscordConfig>>,
}

impl Default for DiscordConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscordConnector {
    pub fn new() -> Self {
        Self {
            base: BaseAdapter::new(),
            http: reqwest::Client::builder().timeout(HTTP_TIMEOUT).build().expect("reqwest client"),
            config: RwLock::new(None),
        }
    }
}

#[async_trait]
impl PlatformConnector for DiscordConnector {
    fn platform(&self) -> &'static str {
        "discord"
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
            .ok_or_else(|| AdapterError::validation_error("discord config requires a non-empty bot_token"))?
            .to_string();
        *self.config.write().await = Some(DiscordConfig { bot_token });
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
            guard.as_ref().ok_or_else(|| AdapterError::platform_error("discord connector not configured"))?.bot_token.clone()
        };

        let resp = self
            .http
            .post(format!("{API_BASE}/channels/{}/messages", target.channel_id))
            .header("Authorization", format!("Bot {token}"))
            .json(&serde_json::json!({ "content": message.content }))
            .send()
            .await
            .map_err(|e| {
                self.base.record_error();
                AdapterError::from(e)
            })?;

        if resp.status().as_u16() == 429 {
            self.base.record_error();
            let body: Value = resp.json().await.unwrap_or_default();
            let retry_after = body.get("retry_after").and_then(Value::as_f64).unwrap_or(1.0);
            return Err(AdapterError::rate_limited("discord rate limit", Duration::from_secs_f64(retry_after)));
        }
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED || resp.status() == reqwest::StatusCode::FORBIDDEN {
            self.base.record_error();
            return Err(AdapterError::auth_failed(format!("discord status {}", resp.status())));
        }
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            self.base.record_error();
            return Err(AdapterError::invalid_target("discord channel not found"));
        }
        if !resp.status().is_success() {
            self.base.record_error();
            return Err(AdapterError::platform_error(format!("discord status {}", resp.status())));
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
        let start = Instant::now();
        let token = self.config.read().await.as_ref().map(|c| c.bot_token.clone());
        let Some(token) = token else {
            return self.base.health(false, None, Some("not configured".into())).await;
        };
        let result = self.http.get(format!("{API_BASE}/users/@me")).header("Authorization", format!("Bot {token}")).send().await;
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
        assert!(caps.media);
        assert!(!caps.read_receipts);
    }

    #[tokio::test]
    async fn initialize_rejects_empty_bot_token() {
        let connector = DiscordConnector::new();
        let err = connector.initialize(serde_json::json!({"bot_token": ""})).await.unwrap_err();
        assert_eq!(err.code, crate::error::AdapterErrorCode::ValidationError);
    }
}
