use ports::secondary::metrics_port::{
    EventMetrics, FlowMetrics, PacketInMetrics, TopologyMetrics,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabels {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OpLabels {
    pub op: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct VipLabels {
    pub vip: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReasonLabels {
    pub reason: String,
}

// ── Controller metrics registry ─────────────────────────────────────

/// Prometheus metrics for the controller.
///
/// All metric families use interior mutability, so recording only needs
/// `&self`; wrap in `Arc` to share across tasks.
pub struct ControllerMetrics {
    registry: Registry,
    packet_ins: Family<KindLabels, Counter>,
    protocol_violations: Counter,
    arp_replies: Counter,
    tcp_resets: Counter,
    syn_dispatches: Family<VipLabels, Counter>,
    flow_mods: Family<OpLabels, Counter>,
    routes_installed: Gauge,
    switches: Gauge,
    links: Gauge,
    hosts: Gauge,
    recompute_duration: Histogram,
    events: Family<KindLabels, Counter>,
    events_dropped: Family<ReasonLabels, Counter>,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("fabriclb");

        let packet_ins = Family::<KindLabels, Counter>::default();
        registry.register(
            "packet_ins",
            "Packet-in messages handled, by kind",
            packet_ins.clone(),
        );

        let protocol_violations = Counter::default();
        registry.register(
            "protocol_violations",
            "Packet-ins dropped because they failed to parse",
            protocol_violations.clone(),
        );

        let arp_replies = Counter::default();
        registry.register(
            "arp_replies",
            "ARP replies synthesized for virtual IPs",
            arp_replies.clone(),
        );

        let tcp_resets = Counter::default();
        registry.register(
            "tcp_resets",
            "Controller-originated TCP resets",
            tcp_resets.clone(),
        );

        let syn_dispatches = Family::<VipLabels, Counter>::default();
        registry.register(
            "syn_dispatches",
            "SYNs dispatched to a backend, by VIP",
            syn_dispatches.clone(),
        );

        let flow_mods = Family::<OpLabels, Counter>::default();
        registry.register(
            "flow_mods",
            "Flow-mod commands sent to switches, by operation",
            flow_mods.clone(),
        );

        let routes_installed = Gauge::default();
        registry.register(
            "routes_installed",
            "Forwarding entries currently tracked as installed",
            routes_installed.clone(),
        );

        let switches = Gauge::default();
        registry.register("switches", "Switches in the topology", switches.clone());

        let links = Gauge::default();
        registry.register("links", "Active inter-switch links", links.clone());

        let hosts = Gauge::default();
        registry.register("hosts", "Hosts known to the topology", hosts.clone());

        let recompute_duration = Histogram::new(exponential_buckets(1e-6, 10.0, 8));
        registry.register(
            "route_recompute_duration_seconds",
            "Full shortest-path recomputation duration",
            recompute_duration.clone(),
        );

        let events = Family::<KindLabels, Counter>::default();
        registry.register("events", "Control-plane events dispatched, by kind", events.clone());

        let events_dropped = Family::<ReasonLabels, Counter>::default();
        registry.register(
            "events_dropped",
            "Control-plane events dropped, by reason",
            events_dropped.clone(),
        );

        Self {
            registry,
            packet_ins,
            protocol_violations,
            arp_replies,
            tcp_resets,
            syn_dispatches,
            flow_mods,
            routes_installed,
            switches,
            links,
            hosts,
            recompute_duration,
            events,
            events_dropped,
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        // Encoding into a String cannot fail.
        let _ = encode(&mut out, &self.registry);
        out
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketInMetrics for ControllerMetrics {
    fn record_packet_in(&self, kind: &str) {
        self.packet_ins
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    fn record_protocol_violation(&self) {
        self.protocol_violations.inc();
    }

    fn record_arp_reply(&self) {
        self.arp_replies.inc();
    }

    fn record_tcp_reset(&self) {
        self.tcp_resets.inc();
    }

    fn record_syn_dispatch(&self, vip: &str) {
        self.syn_dispatches
            .get_or_create(&VipLabels {
                vip: vip.to_string(),
            })
            .inc();
    }
}

impl FlowMetrics for ControllerMetrics {
    fn record_flow_mod(&self, op: &str) {
        self.flow_mods
            .get_or_create(&OpLabels { op: op.to_string() })
            .inc();
    }

    fn set_routes_installed(&self, count: u64) {
        self.routes_installed.set(count as i64);
    }
}

impl TopologyMetrics for ControllerMetrics {
    fn set_switches(&self, count: u64) {
        self.switches.set(count as i64);
    }

    fn set_links(&self, count: u64) {
        self.links.set(count as i64);
    }

    fn set_hosts(&self, count: u64) {
        self.hosts.set(count as i64);
    }

    fn observe_recompute_duration(&self, duration_seconds: f64) {
        self.recompute_duration.observe(duration_seconds);
    }
}

impl EventMetrics for ControllerMetrics {
    fn record_event(&self, kind: &str) {
        self.events
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    fn record_event_dropped(&self, reason: &str) {
        self.events_dropped
            .get_or_create(&ReasonLabels {
                reason: reason.to_string(),
            })
            .inc();
    }
}
