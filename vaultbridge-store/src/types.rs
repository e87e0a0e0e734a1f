//! Data model: `Credential`, `RefreshToken`, `UserProfile`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Providers the store will accept at its boundary. Anything else is
/// rejected before a row is ever written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Anthropic,
    Openrouter,
    Google,
    Xai,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Openrouter => "openrouter",
            Self::Google => "google",
            Self::Xai => "xai",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            "openrouter" => Ok(Self::Openrouter),
            "google" => Ok(Self::Google),
            "xai" => Ok(Self::Xai),
            other => Err(StoreError::InvalidCredential(format!("unknown provider: {other}"))),
        }
    }
}

/// An API credential as presented by the caller (plaintext token — never
/// stored as-is; the store seals it before the first write).
#[derive(Clone, Debug)]
pub struct NewCredential {
    pub id: String,
    pub provider: Provider,
    pub token: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// A credential as returned by `RetrieveCredential` — plaintext token
/// decrypted for the duration of this value's lifetime only.
#[derive(Clone, Debug)]
pub struct Credential {
    pub id: String,
    pub provider: Provider,
    pub token: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Metadata-only view returned by `List` — never decrypts the token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: String,
    pub provider: Provider,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct NewRefreshToken {
    pub id: String,
    pub token: String,
    pub homeserver_url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct RefreshToken {
    pub id: String,
    pub token: String,
    pub homeserver_url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewProfile {
    pub id: String,
    pub profile_name: String,
    pub profile_type: String,
    /// Cleartext JSON describing the shape of `data` — never secret.
    pub field_schema: serde_json::Value,
    pub data: serde_json::Value,
    pub is_default: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Profile {
    pub id: String,
    pub profile_name: String,
    pub profile_type: String,
    pub field_schema: serde_json::Value,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub is_default: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub profile_name: String,
    pub profile_type: String,
    pub field_schema: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_default: bool,
}
