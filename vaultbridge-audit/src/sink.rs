//! Audit sinks. `AuditSinkSync` is synchronous to avoid an `async_trait`
//! dependency; sinks that need to do async I/O use interior mutability,
//! e.g. a channel into a background task.

use std::sync::{Arc, Mutex};

use crate::types::AuditEntry;

/// Where audit entries go. Implement this for a SIEM/log system.
pub trait AuditSinkSync: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Logs entries via the `tracing` crate.
pub struct TracingAuditSink;

impl AuditSinkSync for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            event_type = %entry.event_type,
            actor = ?entry.actor,
            action = %entry.action,
            resource = ?entry.resource,
            severity = ?entry.compliance.severity,
            phi_involved = entry.compliance.phi_involved,
            "audit"
        );
    }
}

/// Collects entries in memory (tests and short-lived tooling).
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSinkSync for InMemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Writes newline-delimited JSON entries to a file, append-only.
pub struct FileAuditSink {
    path: std::path::PathBuf,
}

impl FileAuditSink {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AuditSinkSync for FileAuditSink {
    fn record(&self, entry: AuditEntry) {
        use std::io::Write;
        match std::fs::OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(mut file) => match serde_json::to_string(&entry) {
                Ok(json) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        tracing::error!(error = %e, path = ?self.path, "audit write failed");
                    }
                }
                Err(e) => tracing::error!(error = %e, "audit serialize failed"),
            },
            Err(e) => tracing::error!(error = %e, path = ?self.path, "cannot open audit log"),
        }
    }
}

/// No-op sink used when the caller explicitly does not want auditing
/// (the store's `SetAuditLogger` accepts `None` instead — this exists for
/// places that need a concrete `Arc<dyn AuditSinkSync>`).
pub struct NullAuditSink;

impl AuditSinkSync for NullAuditSink {
    fn record(&self, _entry: AuditEntry) {}
}

pub type SharedSink = Arc<dyn AuditSinkSync>;
