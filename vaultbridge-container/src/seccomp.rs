//! Default seccomp profile: default-allow with a deny list
//! targeting data exfiltration and host tampering, not shell-escape
//! containment (that's handled elsewhere — stripped execute bits, a
//! preloaded hook — outside this crate's scope).
//!
//! A default-deny/allowlist variant is also a defensible choice; this
//! implementation takes the default-allow variant as authoritative.

use serde_json::{json, Value};

const DENIED_NETWORK_SYSCALLS: &[&str] = &["socket", "connect", "accept", "bind", "listen", "sendto", "recvfrom"];
const DENIED_MODULE_SYSCALLS: &[&str] = &["init_module", "finit_module", "delete_module"];
const DENIED_RAW_IO_SYSCALLS: &[&str] = &["iopl", "ioperm"];
const DENIED_KEY_SYSCALLS: &[&str] = &["add_key", "request_key"];
const DENIED_TRACE_SYSCALLS: &[&str] = &["ptrace"];

/// Builds the default seccomp profile as a Docker-API-shaped JSON blob
/// suitable for embedding in `HostConfig.security_opt` as
/// `seccomp=<json>`.
pub fn default_profile() -> Value {
    let mut denied: Vec<&str> = Vec::new();
    denied.extend_from_slice(DENIED_NETWORK_SYSCALLS);
    denied.extend_from_slice(DENIED_TRACE_SYSCALLS);
    denied.extend_from_slice(DENIED_MODULE_SYSCALLS);
    denied.extend_from_slice(DENIED_RAW_IO_SYSCALLS);
    denied.extend_from_slice(DENIED_KEY_SYSCALLS);

    json!({
        "defaultAction": "SCMP_ACT_ALLOW",
        "syscalls": [
            {
                "names": denied,
                "action": "SCMP_ACT_ERRNO",
                "errnoRet": 1
            }
        ]
    })
}

/// Renders the profile as the `security_opt` string Docker expects.
pub fn security_opt_entry() -> String {
    format!("seccomp={}", default_profile())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_the_mandated_syscall_families() {
        let profile = default_profile();
        let names = profile["syscalls"][0]["names"].as_array().unwrap();
        let names: Vec<&str> = names.iter().map(|v| v.as_str().unwrap()).collect();
        for expected in ["socket", "connect", "ptrace", "init_module", "iopl", "add_key"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn default_action_is_allow() {
        assert_eq!(default_profile()["defaultAction"], "SCMP_ACT_ALLOW");
    }
}
