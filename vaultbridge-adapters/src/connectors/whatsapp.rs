//! WhatsApp connector: stub-complete. Typed message/template/
//! event shapes exist so callers and tests can work with the platform's
//! vocabulary, but every operation returns `AdapterError::platform_error`
//! until a real implementation lands.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::base::{BaseAdapter, HealthStatus, Metrics, PlatformConnector};
use crate::capabilities::Capabilities;
use crate::error::AdapterError;
use crate::message::{ExternalEvent, Message, SendResult, Target};

/// The real platform's capability set: no edit, has delete
/// and read_receipts, no reactions, no threads.
pub fn default_capabilities() -> Capabilities {
    Capabilities { read: true, write: true, media: true, reactions: false, threads: false, edit: false, delete: true, typing: true, read_receipts: true }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WhatsAppTemplate {
    pub name: String,
    pub language_code: String,
    pub parameters: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WhatsAppEvent {
    pub from: String,
    pub message_id: String,
    pub payload: Value,
}

pub struct WhatsAppConnector {
    base: BaseAdapter,
}

impl Default for WhatsAppConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl WhatsAppConnector {
    pub fn new() -> Self {
        Self { base: BaseAdapter::new() }
    }

    fn unimplemented() -> AdapterError {
        AdapterError::platform_error("whatsapp not implemented")
    }

    pub async fn send_template(&self, _target: &Target, _template: &WhatsAppTemplate) -> Result<SendResult, AdapterError> {
        Err(Self::unimplemented())
    }
}

#[async_trait]
impl PlatformConnector for WhatsAppConnector {
    fn platform(&self) -> &'static str {
        "whatsapp"
    }

    fn capabilities(&self) -> Capabilities {
        default_capabilities()
    }

    fn version(&self) -> &'static str {
        "0.0-stub"
    }

    async fn initialize(&self, _config: Value) -> Result<(), AdapterError> {
        Err(Self::unimplemented())
    }

    async fn start(&self) -> Result<(), AdapterError> {
        Err(Self::unimplemented())
    }

    async fn shutdown(&self) -> Result<(), AdapterError> {
        self.base.transition(crate::base::AdapterState::Stopped).await
    }

    async fn send_message(&self, _target: &Target, _message: &Message) -> Result<SendResult, AdapterError> {
        Err(Self::unimplemented())
    }

    async fn receive_event(&self, _event: ExternalEvent) -> Result<(), AdapterError> {
        Err(Self::unimplemented())
    }

    async fn health_check(&self) -> HealthStatus {
        self.base.health(false, None, Some("whatsapp not implemented".into())).await
    }

    fn metrics(&self) -> Metrics {
        self.base.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capability_set_matches_the_real_platform() {
        let caps = default_capabilities();
        assert!(!caps.edit);
        assert!(caps.delete);
        assert!(caps.read_receipts);
        assert!(!caps.reactions);
        assert!(!caps.threads);
    }

    #[tokio::test]
    async fn every_operation_returns_a_clear_unimplemented_error() {
        let connector = WhatsAppConnector::new();
        assert!(connector.initialize(serde_json::json!({})).await.is_err());
        assert!(connector.start().await.is_err());
        let target = Target { channel_id: "1".into(), thread_id: None };
        let msg = Message {
            id: "m".into(),
            message_type: None,
            content: "hi".into(),
            attachments: vec![],
            reply_to: None,
            timestamp: None,
            metadata: Default::default(),
            signature: None,
        };
        assert!(connector.send_message(&target, &msg).await.is_err());
    }
}
