//! Enforcement helper for the PII-safety invariant:
//! for any event with `phi_involved = true`, `details` may contain only
//! field **names** and outcome **booleans** — never field **values**.
//!
//! This is a debug-time assertion rather than a runtime error: audit
//! construction must never fail in production (a logging bug should not
//! block the operation being audited), but violations should be loud in
//! development and CI.

use serde_json::Value;

use crate::types::AuditEntry;

/// Panics in debug builds if `entry.compliance.phi_involved` is true and
/// `details` contains anything other than strings (field names) or
/// booleans (outcomes). A no-op in release builds.
pub fn assert_pii_safe(entry: &AuditEntry) {
    if !entry.compliance.phi_involved {
        return;
    }
    debug_assert!(
        entry.details.values().all(is_name_or_outcome),
        "PII-involved audit entry must carry only field names or outcome booleans in `details`, got: {:?}",
        entry.details
    );
}

fn is_name_or_outcome(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Bool(_) | Value::Array(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Actor, Compliance};

    #[test]
    fn allows_names_and_booleans() {
        let entry = AuditEntry::new("pii.accessed", Actor::system(), "access", Compliance::pii("privacy"))
            .with_detail("fields", serde_json::json!(["email", "phone"]))
            .with_detail("granted", true);
        assert_pii_safe(&entry);
    }

    #[test]
    #[should_panic]
    fn rejects_raw_values() {
        let entry = AuditEntry::new("pii.accessed", Actor::system(), "access", Compliance::pii("privacy"))
            .with_detail("email", "alice@example.com");
        assert_pii_safe(&entry);
    }
}
