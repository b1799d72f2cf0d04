use std::net::Ipv4Addr;

use domain::common::entity::MacAddr;

/// Lookup into the host framework's device inventory.
///
/// The edge handler uses this to resolve a backend's MAC before installing
/// rewrite rules; a miss means the SYN is dropped and the client retries.
pub trait DeviceResolver: Send + Sync {
    fn mac_for_ip(&self, ip: Ipv4Addr) -> Option<MacAddr>;
}
