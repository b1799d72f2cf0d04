use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/fabriclb/config.yaml";

/// Capacity of the inbound event channel. Packet-ins dominate; topology
/// events are rare.
pub const EVENT_CHANNEL_CAPACITY: usize = 10_000;

pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
