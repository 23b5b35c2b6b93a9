use std::process::Command;

use super::is_usable_mac;

/// First hardware address reported by `getmac /fo csv /nh`.
///
/// Each line looks like `"3C-22-FB-12-9A-01","\Device\Tcpip_{...}"`.
pub fn primary_mac_address() -> Option<String> {
    let output = Command::new("getmac")
        .args(["/fo", "csv", "/nh"])
        .output()
        .ok()?;
    let result = String::from_utf8_lossy(&output.stdout);

    result.lines().find_map(|line| {
        let first = line.split(',').next()?.trim().trim_matches('"');
        is_usable_mac(first).then(|| first.to_string())
    })
}
