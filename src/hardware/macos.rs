use std::process::Command;

use super::is_usable_mac;

/// Hardware address of `en0`, the built-in interface on every Mac.
///
/// Uses `ifconfig en0` and reads the `ether` line.
pub fn primary_mac_address() -> Option<String> {
    let output = Command::new("ifconfig").arg("en0").output().ok()?;
    let result = String::from_utf8_lossy(&output.stdout);

    result
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("ether "))
        .map(|rest| rest.split_whitespace().next().unwrap_or("").to_string())
        .filter(|mac| is_usable_mac(mac))
}
