//! The wire-neutral `Message`/`Target`/`ExternalEvent` trio every connector
//! translates to and from its platform's own format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::AdapterError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
    Media,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type", default)]
    pub message_type: Option<MessageType>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Where a message is being sent: platform-specific addressing, kept
/// generic enough that the adapter framework never needs to know a
/// platform's channel/user id shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    pub channel_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// An inbound event a connector translates from a platform webhook/socket
/// payload before handing it to `PlatformConnector::receive_event`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub platform: String,
    pub raw: Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct SendResult {
    pub platform_message_id: String,
}

/// Validates and normalizes `m` in place:
/// non-empty `id`; content-or-attachments; default `timestamp` to now;
/// default `type` to `text`.
pub fn validate_message(m: &mut Message) -> Result<(), AdapterError> {
    if m.id.is_empty() {
        return Err(AdapterError::validation_error("message id must not be empty"));
    }
    if m.content.is_empty() && m.attachments.is_empty() {
        return Err(AdapterError::validation_error("message must have content or at least one attachment"));
    }
    if m.timestamp.is_none() {
        m.timestamp = Some(Utc::now());
    }
    if m.message_type.is_none() {
        m.message_type = Some(MessageType::Text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(id: &str) -> Message {
        Message {
            id: id.to_string(),
            message_type: None,
            content: String::new(),
            attachments: Vec::new(),
            reply_to: None,
            timestamp: None,
            metadata: BTreeMap::new(),
            signature: None,
        }
    }

    #[test]
    fn validate_message_boundary_scenarios() {
        let mut ok = base("m1");
        ok.content = "hi".into();
        ok.timestamp = Some(Utc::now());
        assert!(validate_message(&mut ok).is_ok());

        let mut missing_id = base("");
        missing_id.content = "hi".into();
        assert!(validate_message(&mut missing_id).is_err());

        let mut empty = base("m2");
        assert!(validate_message(&mut empty).is_err());

        let mut attachment_only = base("m3");
        attachment_only.attachments.push(Attachment { id: "a".into(), url: "https://example.com/a".into(), mime_type: None });
        assert!(validate_message(&mut attachment_only).is_ok());
    }

    #[test]
    fn defaults_timestamp_and_type_when_unset() {
        let mut m = base("m4");
        m.content = "hi".into();
        validate_message(&mut m).unwrap();
        assert!(m.timestamp.is_some());
        assert_eq!(m.message_type, Some(MessageType::Text));
    }
}
