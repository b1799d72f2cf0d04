// Focused sub-traits for recording metrics, grouped by concern.
//
// All methods take `&self`; implementations use interior mutability.
// Default implementations are no-ops so test mocks only implement the
// sub-traits relevant to the service under test.

// ── Packet-in path ─────────────────────────────────────────────────

pub trait PacketInMetrics: Send + Sync {
    /// Record a packet-in by kind (`arp`, `tcp_syn`, `tcp_other`, ...).
    fn record_packet_in(&self, _kind: &str) {}

    /// Record a packet-in dropped because it failed to parse.
    fn record_protocol_violation(&self) {}

    /// Record a synthesized ARP reply for a virtual IP.
    fn record_arp_reply(&self) {}

    /// Record a controller-originated TCP reset.
    fn record_tcp_reset(&self) {}

    /// Record a SYN dispatched to a backend of the given VIP.
    fn record_syn_dispatch(&self, _vip: &str) {}
}

// ── Flow programming ───────────────────────────────────────────────

pub trait FlowMetrics: Send + Sync {
    /// Record a flow-mod sent to a switch (`op` is `install` or `remove`).
    fn record_flow_mod(&self, _op: &str) {}

    /// Set the number of forwarding entries currently tracked as installed.
    fn set_routes_installed(&self, _count: u64) {}
}

// ── Topology and routing ───────────────────────────────────────────

pub trait TopologyMetrics: Send + Sync {
    fn set_switches(&self, _count: u64) {}

    fn set_links(&self, _count: u64) {}

    fn set_hosts(&self, _count: u64) {}

    /// Observe a full route recomputation duration in seconds.
    fn observe_recompute_duration(&self, _duration_seconds: f64) {}
}

// ── Event pipeline ─────────────────────────────────────────────────

pub trait EventMetrics: Send + Sync {
    /// Record a dispatched event by kind.
    fn record_event(&self, _kind: &str) {}

    /// Record an event dropped with a reason label.
    fn record_event_dropped(&self, _reason: &str) {}
}

// ── Composite super-trait ──────────────────────────────────────────

/// Unified metrics port composing all sub-traits. Services hold
/// `Arc<dyn MetricsPort>`; mocks override only what they assert on.
pub trait MetricsPort:
    PacketInMetrics + FlowMetrics + TopologyMetrics + EventMetrics
{
}

impl<T> MetricsPort for T where
    T: PacketInMetrics + FlowMetrics + TopologyMetrics + EventMetrics
{
}
