//! # vaultbridge-adapters
//!
//! The platform adapter framework and its connectors: a capability-typed
//! `PlatformConnector` trait, a `BaseAdapter` providing shared
//! metrics/lifecycle state by composition, message validation, HMAC
//! signing, and the unified `AdapterError` taxonomy, plus the
//! Slack/Discord/Teams/WhatsApp connectors built on it.
//!
//! ```rust,no_run
//! use vaultbridge_adapters::{connectors::slack::SlackConnector, PlatformConnector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let slack = SlackConnector::new();
//! slack.initialize(serde_json::json!({"bot_token": "xoxb-..."})).await?;
//! slack.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod base;
pub mod capabilities;
pub mod connectors;
pub mod error;
pub mod message;
pub mod sign;

pub use base::{AdapterState, BaseAdapter, HealthStatus, Metrics, PlatformConnector};
pub use capabilities::Capabilities;
pub use error::{AdapterError, AdapterErrorCode};
pub use message::{validate_message, Attachment, ExternalEvent, Message, MessageType, SendResult, Target};
pub use sign::{sign_message, verify_signature};
