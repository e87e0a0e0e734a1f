//! # vaultbridge-audit
//!
//! Tamper-evident, PII-safe audit logging shared by the encrypted store, the
//! container client, and the platform adapters.
//!
//! Components fetch the current logger under a read-lock before recording
//! each event; swapping loggers (e.g. to install a capturing sink in tests)
//! takes the write lock on the same global.
//!
//! ```rust
//! use vaultbridge_audit::{set_default_logger, default_logger, sink::InMemoryAuditSink};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(InMemoryAuditSink::new());
//! set_default_logger(Some(sink.clone()));
//! if let Some(logger) = default_logger() {
//!     // record events through `logger.record(..)`
//!     let _ = logger;
//! }
//! ```

pub mod chain;
pub mod compliance;
pub mod sink;
pub mod types;

use std::sync::RwLock;

use sink::SharedSink;

pub use sink::{AuditSinkSync, FileAuditSink, InMemoryAuditSink, NullAuditSink, TracingAuditSink};
pub use types::{Actor, ActorType, AuditEntry, Compliance, Resource, Severity};

static DEFAULT_LOGGER: RwLock<Option<SharedSink>> = RwLock::new(None);

/// Fetch the process-wide default audit logger, if one has been installed.
/// A missing logger is allowed and silent.
pub fn default_logger() -> Option<SharedSink> {
    DEFAULT_LOGGER.read().expect("audit logger lock poisoned").clone()
}

/// Install (or clear, with `None`) the process-wide default audit logger.
pub fn set_default_logger(logger: Option<SharedSink>) {
    *DEFAULT_LOGGER.write().expect("audit logger lock poisoned") = logger;
}

/// Record `entry` through the currently installed default logger, applying
/// the PII-safety debug assertion first. A no-op if no logger is installed.
pub fn record(entry: AuditEntry) {
    compliance::assert_pii_safe(&entry);
    if let Some(logger) = default_logger() {
        logger.record(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn default_logger_roundtrip() {
        let sink = Arc::new(InMemoryAuditSink::new());
        set_default_logger(Some(sink.clone()));
        record(AuditEntry::new("test.event", Actor::system(), "noop", Compliance::routine("test")));
        assert_eq!(sink.len(), 1);
        set_default_logger(None);
        record(AuditEntry::new("test.event", Actor::system(), "noop", Compliance::routine("test")));
        assert_eq!(sink.len(), 1);
    }
}
