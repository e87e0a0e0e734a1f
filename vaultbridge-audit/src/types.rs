//! Audit entry data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who or what triggered an event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actor {
    pub actor_type: ActorType,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self { actor_type: ActorType::System, id: "system".into(), ip: None }
    }

    pub fn user(id: impl Into<String>, ip: Option<String>) -> Self {
        Self { actor_type: ActorType::User, id: id.into(), ip }
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self { actor_type: ActorType::Agent, id: id.into(), ip: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    System,
    User,
    Agent,
}

/// What was acted upon.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self { resource_type: resource_type.into(), id: id.into(), name: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Compliance metadata. `phi_involved = true` constrains `details` to
/// field names and outcome booleans only — see
/// [`crate::compliance::assert_pii_safe`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Compliance {
    pub category: String,
    pub severity: Severity,
    pub audit_required: bool,
    pub phi_involved: bool,
}

impl Compliance {
    pub fn routine(category: impl Into<String>) -> Self {
        Self { category: category.into(), severity: Severity::Low, audit_required: false, phi_involved: false }
    }

    pub fn critical(category: impl Into<String>) -> Self {
        Self { category: category.into(), severity: Severity::High, audit_required: true, phi_involved: false }
    }

    pub fn pii(category: impl Into<String>) -> Self {
        Self { category: category.into(), severity: Severity::Medium, audit_required: true, phi_involved: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A structured, tamper-evident audit entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event_type: String,
    pub actor: Actor,
    pub action: String,
    pub resource: Option<Resource>,
    pub details: BTreeMap<String, Value>,
    pub compliance: Compliance,
    pub timestamp: DateTime<Utc>,

    /// Monotonic sequence number (populated by [`crate::chain::IntegrityChainSink`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// SHA-256 hex digest of the previous entry's JSON (populated by
    /// [`crate::chain::IntegrityChainSink`]). The first entry's `prev_hash`
    /// is `SHA-256("vaultbridge-audit-genesis")`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
}

impl AuditEntry {
    pub fn new(
        event_type: impl Into<String>,
        actor: Actor,
        action: impl Into<String>,
        compliance: Compliance,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            actor,
            action: action.into(),
            resource: None,
            details: BTreeMap::new(),
            compliance,
            timestamp: Utc::now(),
            sequence: None,
            prev_hash: None,
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
