use std::fs;
use std::path::Path;

use super::is_usable_mac;

const NET_CLASS_DIR: &str = "/sys/class/net";

/// Hardware address of the first physical-looking interface, by name order.
///
/// Reads `/sys/class/net/<iface>/address`; loopback and virtual bridges are
/// skipped so the id does not change when containers come and go.
pub fn primary_mac_address() -> Option<String> {
    let mut interfaces: Vec<String> = fs::read_dir(NET_CLASS_DIR)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !is_virtual_interface(name))
        .collect();
    interfaces.sort();

    interfaces.iter().find_map(|iface| {
        let path = Path::new(NET_CLASS_DIR).join(iface).join("address");
        let address = fs::read_to_string(path).ok()?;
        let address = address.trim();
        is_usable_mac(address).then(|| address.to_string())
    })
}

fn is_virtual_interface(name: &str) -> bool {
    name == "lo"
        || ["docker", "veth", "br-", "virbr", "vmnet", "tun", "tap", "wg"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
}
