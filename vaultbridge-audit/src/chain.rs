//! Tamper-evident hash chaining.
//!
//! Wraps any [`AuditSinkSync`] and adds a SHA-256 hash chain: each entry gets
//! a monotonic `sequence` and a `prev_hash` holding the SHA-256 hex digest of
//! the previous entry's JSON. Replaying the log and recomputing hashes
//! detects any insertion, deletion, or modification after the fact.
//!
//! The genesis hash is `SHA-256("vaultbridge-audit-genesis")`.

use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::sink::AuditSinkSync;
use crate::types::AuditEntry;

pub struct IntegrityChainSink {
    inner: Arc<dyn AuditSinkSync>,
    state: Mutex<ChainState>,
}

struct ChainState {
    sequence: u64,
    prev_hash: String,
}

impl IntegrityChainSink {
    pub fn new(inner: Arc<dyn AuditSinkSync>) -> Self {
        let genesis = format!("{:x}", Sha256::digest(b"vaultbridge-audit-genesis"));
        Self { inner, state: Mutex::new(ChainState { sequence: 0, prev_hash: genesis }) }
    }
}

impl AuditSinkSync for IntegrityChainSink {
    fn record(&self, mut entry: AuditEntry) {
        let mut state = self.state.lock().unwrap();

        entry.sequence = Some(state.sequence);
        entry.prev_hash = Some(state.prev_hash.clone());

        if let Ok(json) = serde_json::to_string(&entry) {
            state.prev_hash = format!("{:x}", Sha256::digest(json.as_bytes()));
        }
        state.sequence += 1;

        drop(state);
        self.inner.record(entry);
    }
}

/// Replays a previously recorded sequence of entries and confirms the hash
/// chain is unbroken. Returns the index of the first broken link, if any.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), usize> {
    let mut expected_prev = format!("{:x}", Sha256::digest(b"vaultbridge-audit-genesis"));
    for (i, entry) in entries.iter().enumerate() {
        if entry.prev_hash.as_deref() != Some(expected_prev.as_str()) {
            return Err(i);
        }
        let mut relinked = entry.clone();
        relinked.prev_hash = Some(expected_prev.clone());
        let json = serde_json::to_string(&relinked).expect("AuditEntry always serializes");
        expected_prev = format!("{:x}", Sha256::digest(json.as_bytes()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemoryAuditSink;
    use crate::types::{Actor, Compliance};

    #[test]
    fn chains_sequential_entries() {
        let inner = Arc::new(InMemoryAuditSink::new());
        let chain = IntegrityChainSink::new(inner.clone());

        for i in 0..5 {
            chain.record(AuditEntry::new(
                "test.event",
                Actor::system(),
                "noop",
                Compliance::routine("test"),
            ).with_detail("i", i));
        }

        let entries = inner.entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].sequence, Some(0));
        assert_eq!(entries[4].sequence, Some(4));
        assert!(verify_chain(&entries).is_ok());
    }

    #[test]
    fn detects_tampering() {
        let inner = Arc::new(InMemoryAuditSink::new());
        let chain = IntegrityChainSink::new(inner.clone());
        for _ in 0..3 {
            chain.record(AuditEntry::new("test.event", Actor::system(), "noop", Compliance::routine("test")));
        }
        let mut entries = inner.entries();
        entries[1].action = "tampered".into();
        assert_eq!(verify_chain(&entries), Err(2));
    }
}
