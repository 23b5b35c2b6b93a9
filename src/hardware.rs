//! Machine identity.
//!
//! The identifier is a SHA-256 fingerprint of the primary network hardware
//! address. It is computed once per process and then passed around as a
//! plain [`MachineId`] value.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

static MACHINE_ID: OnceLock<MachineId> = OnceLock::new();

/// Stable identifier of one machine: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineId(String);

impl MachineId {
    /// Wrap an identifier obtained elsewhere (stored rows, tests, another host).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fingerprint a raw host attribute.
    ///
    /// Hardware addresses are normalised first so `AA-BB-..` and `aa:bb:..`
    /// produce the same id.
    pub fn from_host_attribute(attribute: &str) -> Self {
        let normalized = attribute.trim().to_ascii_lowercase().replace('-', ":");
        let digest = Sha256::digest(normalized.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, enough to tell machines apart in logs.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MachineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns the identifier of the current machine.
///
/// Computed on first call and cached for the rest of the process.
pub fn current_machine_id() -> MachineId {
    MACHINE_ID
        .get_or_init(|| MachineId::from_host_attribute(&host_attribute()))
        .clone()
}

/// The raw attribute the fingerprint is derived from.
///
/// Falls back to the host name, then to a fixed placeholder, so the caller
/// always gets a value.
fn host_attribute() -> String {
    if let Some(mac) = primary_hardware_address() {
        return mac;
    }

    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(name) = std::env::var(var) {
            if !name.trim().is_empty() {
                tracing::debug!("no hardware address found, using host name");
                return format!("host:{}", name.trim());
            }
        }
    }

    tracing::warn!("no hardware address or host name available, using placeholder id");
    "unknown-host".to_string()
}

fn primary_hardware_address() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        linux::primary_mac_address()
    }
    #[cfg(target_os = "macos")]
    {
        macos::primary_mac_address()
    }
    #[cfg(target_os = "windows")]
    {
        windows::primary_mac_address()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// True for a well-formed, non-zero 48-bit address in colon or dash notation.
pub(crate) fn is_usable_mac(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split(|c| c == ':' || c == '-').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
        && parts.iter().any(|p| *p != "00")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let a = MachineId::from_host_attribute("aa:bb:cc:dd:ee:ff");
        let b = MachineId::from_host_attribute("aa:bb:cc:dd:ee:ff");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_ignores_notation() {
        let colon = MachineId::from_host_attribute("AA:BB:CC:DD:EE:FF");
        let dash = MachineId::from_host_attribute("aa-bb-cc-dd-ee-ff");
        assert_eq!(colon, dash);
    }

    #[test]
    fn different_hosts_differ() {
        let a = MachineId::from_host_attribute("aa:bb:cc:dd:ee:01");
        let b = MachineId::from_host_attribute("aa:bb:cc:dd:ee:02");
        assert_ne!(a, b);
    }

    #[test]
    fn current_machine_id_is_cached() {
        assert_eq!(current_machine_id(), current_machine_id());
    }

    #[test]
    fn usable_mac_rules() {
        assert!(is_usable_mac("3c:22:fb:12:9a:01"));
        assert!(is_usable_mac("3C-22-FB-12-9A-01"));
        assert!(!is_usable_mac("00:00:00:00:00:00"));
        assert!(!is_usable_mac("not-a-mac"));
    }
}
