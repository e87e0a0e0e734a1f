//! Host entropy collection.
//!
//! Produces a deterministic-per-host byte string by concatenating, in fixed
//! order and joined by `:`, whichever of the listed sources are readable.
//! Absent sources are simply omitted — the salt store provides per-install
//! uniqueness, so a partially-populated string is not a security problem.
//! The resulting bytes are fed straight into the KDF and are never
//! persisted anywhere.

use std::fs;
use std::process::Command;

const MACHINE_ID_PRIMARY: &str = "/etc/machine-id";
const MACHINE_ID_FALLBACK: &str = "/var/lib/dbus/machine-id";
const DMI_PRODUCT_UUID: &str = "/sys/class/dmi/id/product_uuid";
const CPUINFO_PATH: &str = "/proc/cpuinfo";

const DMI_SENTINELS: &[&str] = &["Not Settable", "Not Present"];

/// Collect the host entropy string. Never fails — an entirely empty machine
/// (all sources unreadable) simply yields an empty-ish string; the salt
/// still guarantees per-install uniqueness.
pub fn collect() -> Vec<u8> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(id) = machine_id() {
        parts.push(id);
    }
    if let Some(uuid) = dmi_product_uuid() {
        parts.push(uuid);
    }
    if let Some(mac) = primary_mac_address() {
        parts.push(mac);
    }
    if let Some(host) = hostname() {
        parts.push(host);
    }
    parts.push(std::env::consts::OS.to_string());
    parts.push(std::env::consts::ARCH.to_string());
    if let Some((model, vendor)) = cpu_identity() {
        parts.push(model);
        parts.push(vendor);
    }

    parts.join(":").into_bytes()
}

fn machine_id() -> Option<String> {
    read_trimmed(MACHINE_ID_PRIMARY).or_else(|| read_trimmed(MACHINE_ID_FALLBACK))
}

fn dmi_product_uuid() -> Option<String> {
    if let Some(uuid) = read_trimmed(DMI_PRODUCT_UUID) {
        if !DMI_SENTINELS.contains(&uuid.as_str()) {
            return Some(uuid);
        }
    }
    // Fallback to a system inspection tool when the sysfs node is absent
    // (common in some container/VM configurations).
    let output = Command::new("dmidecode").args(["-s", "system-uuid"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let uuid = String::from_utf8(output.stdout).ok()?.trim().to_string();
    if uuid.is_empty() || DMI_SENTINELS.contains(&uuid.as_str()) {
        return None;
    }
    Some(uuid)
}

fn primary_mac_address() -> Option<String> {
    let net_dir = fs::read_dir("/sys/class/net").ok()?;
    let mut candidates: Vec<String> = net_dir
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    candidates.sort();

    for iface in candidates {
        if iface == "lo" {
            continue;
        }
        let operstate = read_trimmed(&format!("/sys/class/net/{iface}/operstate"));
        if operstate.as_deref() != Some("up") {
            continue;
        }
        if let Some(addr) = read_trimmed(&format!("/sys/class/net/{iface}/address")) {
            if addr != "00:00:00:00:00:00" {
                return Some(addr);
            }
        }
    }
    None
}

fn hostname() -> Option<String> {
    read_trimmed("/proc/sys/kernel/hostname")
        .or_else(|| std::env::var("HOSTNAME").ok())
}

fn cpu_identity() -> Option<(String, String)> {
    let data = fs::read_to_string(CPUINFO_PATH).ok()?;
    let mut model = None;
    let mut vendor = None;
    for line in data.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim().to_string();
            if key == "model name" && model.is_none() {
                model = Some(value);
            } else if key == "vendor_id" && vendor.is_none() {
                vendor = Some(value);
            }
        }
        if model.is_some() && vendor.is_some() {
            break;
        }
    }
    match (model, vendor) {
        (Some(m), Some(v)) => Some((m, v)),
        _ => None,
    }
}

fn read_trimmed(path: &str) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_is_stable_within_a_process() {
        let a = collect();
        let b = collect();
        assert_eq!(a, b);
    }

    #[test]
    fn collect_always_includes_os_and_arch() {
        let bytes = collect();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.contains(std::env::consts::OS));
        assert!(s.contains(std::env::consts::ARCH));
    }
}
