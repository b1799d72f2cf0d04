use std::sync::Arc;

use domain::common::entity::{PortNo, SwitchId};
use domain::flow::entity::{
    FlowAction, FlowMatch, FlowMod, TableId, FLOW_IDLE_TIMEOUT_SECS, PRIORITY_FLOW,
};
use domain::loadbalancer::entity::VipInstance;
use domain::loadbalancer::registry::VipRegistry;
use domain::packet::arp::ArpPacket;
use domain::packet::error::PacketError;
use domain::packet::ethernet::{EthernetFrame, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use domain::packet::ipv4::{Ipv4Packet, PROTO_TCP};
use domain::packet::tcp::TcpSegment;
use ports::primary::routing_oracle::RoutingOracle;
use ports::secondary::device_port::DeviceResolver;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::switch_port::SwitchControl;

/// Edge state machine for virtual-IP traffic.
///
/// Consumes packet-ins raised by the VIP catch rules. ARP requests for a
/// VIP are answered from the controller; a TCP SYN picks a backend and
/// pins the connection with a pair of rewrite rules; any other TCP packet
/// to a VIP is answered with a reset instead of being black-holed. Every
/// rewrite rule ends in a goto to the forwarding table so the rewritten
/// packet is actually switched.
pub struct LbEdgeService {
    registry: Arc<VipRegistry>,
    devices: Arc<dyn DeviceResolver>,
    switch: Arc<dyn SwitchControl>,
    oracle: Arc<dyn RoutingOracle>,
    metrics: Arc<dyn MetricsPort>,
    table: TableId,
}

impl LbEdgeService {
    pub fn new(
        registry: Arc<VipRegistry>,
        devices: Arc<dyn DeviceResolver>,
        switch: Arc<dyn SwitchControl>,
        oracle: Arc<dyn RoutingOracle>,
        metrics: Arc<dyn MetricsPort>,
        table: TableId,
    ) -> Self {
        Self {
            registry,
            devices,
            switch,
            oracle,
            metrics,
            table,
        }
    }

    /// Handle one packet-in. Malformed packets are dropped and counted;
    /// nothing here is fatal.
    pub fn handle_packet_in(&self, switch: SwitchId, in_port: PortNo, frame: &[u8]) {
        if let Err(e) = self.process(switch, in_port, frame) {
            self.metrics.record_protocol_violation();
            tracing::debug!(%switch, in_port, error = %e, "packet-in dropped");
        }
    }

    fn process(
        &self,
        switch: SwitchId,
        in_port: PortNo,
        frame: &[u8],
    ) -> Result<(), PacketError> {
        let eth = EthernetFrame::parse(frame)?;
        match eth.ethertype {
            ETHERTYPE_ARP => self.handle_arp(switch, in_port, &eth),
            ETHERTYPE_IPV4 => self.handle_ipv4(switch, in_port, &eth),
            other => {
                tracing::trace!(%switch, ethertype = %format!("{other:#06x}"), "packet-in ignored");
                Ok(())
            }
        }
    }

    /// Answer ARP requests for known VIPs; ignore everything else.
    fn handle_arp(
        &self,
        switch: SwitchId,
        in_port: PortNo,
        eth: &EthernetFrame,
    ) -> Result<(), PacketError> {
        let arp = ArpPacket::parse(&eth.payload)?;
        self.metrics.record_packet_in("arp");
        if !arp.is_request() {
            return Ok(());
        }
        let Some(instance) = self.registry.get(arp.target_ip) else {
            return Ok(());
        };

        let reply = arp.reply(instance.vip, instance.vmac);
        let reply_frame = EthernetFrame {
            dst: eth.src,
            src: instance.vmac,
            ethertype: ETHERTYPE_ARP,
            payload: reply.to_bytes(),
        };
        match self
            .switch
            .send_packet(switch, in_port, &reply_frame.to_bytes())
        {
            Ok(()) => {
                self.metrics.record_arp_reply();
                tracing::debug!(%switch, vip = %instance.vip, "ARP reply sent");
            }
            Err(e) => {
                tracing::warn!(%switch, vip = %instance.vip, error = %e, "ARP reply send failed");
            }
        }
        Ok(())
    }

    fn handle_ipv4(
        &self,
        switch: SwitchId,
        in_port: PortNo,
        eth: &EthernetFrame,
    ) -> Result<(), PacketError> {
        let ip = Ipv4Packet::parse(&eth.payload)?;
        let Some(instance) = self.registry.get(ip.dst) else {
            return Ok(());
        };
        if ip.protocol != PROTO_TCP {
            return Ok(());
        }

        let tcp = TcpSegment::parse(&ip.payload)?;
        if tcp.is_syn() {
            self.metrics.record_packet_in("tcp_syn");
            self.dispatch_syn(switch, instance, &ip, &tcp);
        } else {
            self.metrics.record_packet_in("tcp_other");
            self.send_reset(switch, in_port, instance, eth, &ip, &tcp);
        }
        Ok(())
    }

    /// Pick the next backend and pin the connection on the reporting
    /// switch with symmetric rewrite rules.
    fn dispatch_syn(
        &self,
        switch: SwitchId,
        instance: &VipInstance,
        ip: &Ipv4Packet,
        tcp: &TcpSegment,
    ) {
        let backend = instance.next_backend();
        let Some(backend_mac) = self.devices.mac_for_ip(backend) else {
            // No partial rules: drop the SYN, the client retransmits and
            // gets another chance once the device service knows the MAC.
            tracing::debug!(%switch, %backend, vip = %instance.vip, "backend MAC unresolved, SYN dropped");
            return;
        };

        let forwarding_table = self.oracle.forwarding_table();
        let inbound = FlowMod::new(
            self.table,
            PRIORITY_FLOW,
            FlowMatch::tcp_connection(ip.src, tcp.src_port, instance.vip, tcp.dst_port),
            vec![
                FlowAction::SetEthDst(backend_mac),
                FlowAction::SetIpv4Dst(backend),
                FlowAction::GotoTable(forwarding_table),
            ],
        )
        .with_idle_timeout(FLOW_IDLE_TIMEOUT_SECS);
        let outbound = FlowMod::new(
            self.table,
            PRIORITY_FLOW,
            FlowMatch::tcp_connection(backend, tcp.dst_port, ip.src, tcp.src_port),
            vec![
                FlowAction::SetEthSrc(instance.vmac),
                FlowAction::SetIpv4Src(instance.vip),
                FlowAction::GotoTable(forwarding_table),
            ],
        )
        .with_idle_timeout(FLOW_IDLE_TIMEOUT_SECS);

        if let Err(e) = self.switch.install_flow(switch, &inbound) {
            tracing::warn!(%switch, vip = %instance.vip, error = %e, "inbound rewrite install failed");
            return;
        }
        if let Err(e) = self.switch.install_flow(switch, &outbound) {
            // The half-installed inbound rule idles out on its own.
            tracing::warn!(%switch, vip = %instance.vip, error = %e, "outbound rewrite install failed");
            return;
        }
        self.metrics.record_syn_dispatch(&instance.vip.to_string());
        tracing::info!(
            %switch,
            vip = %instance.vip,
            %backend,
            client = %ip.src,
            client_port = tcp.src_port,
            "connection pinned to backend"
        );
    }

    /// Collapse a stray mid-flow packet with a controller-originated reset
    /// rather than black-holing it.
    fn send_reset(
        &self,
        switch: SwitchId,
        in_port: PortNo,
        instance: &VipInstance,
        eth: &EthernetFrame,
        ip: &Ipv4Packet,
        tcp: &TcpSegment,
    ) {
        let segment = tcp.reset_reply(instance.vip, ip.src);
        let datagram = Ipv4Packet::build(instance.vip, ip.src, PROTO_TCP, &segment);
        let frame = EthernetFrame {
            dst: eth.src,
            src: instance.vmac,
            ethertype: ETHERTYPE_IPV4,
            payload: datagram,
        };
        match self.switch.send_packet(switch, in_port, &frame.to_bytes()) {
            Ok(()) => {
                self.metrics.record_tcp_reset();
                tracing::debug!(%switch, vip = %instance.vip, client = %ip.src, "TCP reset sent");
            }
            Err(e) => {
                tracing::warn!(%switch, vip = %instance.vip, error = %e, "TCP reset send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicU32, Ordering};

    use adapters::memory::fabric::{MemoryFabric, StaticDeviceIndex};
    use domain::common::entity::MacAddr;
    use domain::loadbalancer::registry::parse_instances;
    use domain::packet::arp::{ArpPacket, OP_REPLY, OP_REQUEST};
    use domain::packet::tcp::{FLAG_ACK, FLAG_RST, FLAG_SYN};
    use ports::secondary::metrics_port::{
        EventMetrics, FlowMetrics, PacketInMetrics, TopologyMetrics,
    };

    const LB_TABLE: TableId = 0;
    const FORWARDING_TABLE: TableId = 1;

    struct FixedOracle;

    impl RoutingOracle for FixedOracle {
        fn forwarding_table(&self) -> TableId {
            FORWARDING_TABLE
        }
    }

    #[derive(Default)]
    struct TestMetrics {
        violations: AtomicU32,
        resets: AtomicU32,
        arp_replies: AtomicU32,
    }

    impl PacketInMetrics for TestMetrics {
        fn record_protocol_violation(&self) {
            self.violations.fetch_add(1, Ordering::Relaxed);
        }

        fn record_arp_reply(&self) {
            self.arp_replies.fetch_add(1, Ordering::Relaxed);
        }

        fn record_tcp_reset(&self) {
            self.resets.fetch_add(1, Ordering::Relaxed);
        }
    }
    impl FlowMetrics for TestMetrics {}
    impl TopologyMetrics for TestMetrics {}
    impl EventMetrics for TestMetrics {}

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn vip() -> Ipv4Addr {
        ip(100)
    }

    fn vmac() -> MacAddr {
        MacAddr([2, 0, 0, 0, 0, 0x64])
    }

    fn client_mac() -> MacAddr {
        MacAddr([0xaa, 0xbb, 0xcc, 0, 0, 0x50])
    }

    struct Harness {
        service: LbEdgeService,
        fabric: Arc<MemoryFabric>,
        metrics: Arc<TestMetrics>,
    }

    fn harness() -> Harness {
        let (instances, errors) =
            parse_instances("10.0.0.100 02:00:00:00:00:64 10.0.0.1,10.0.0.2");
        assert!(errors.is_empty());
        let registry = Arc::new(VipRegistry::new(instances));

        let devices = Arc::new(StaticDeviceIndex::new());
        devices.insert(ip(1), MacAddr([2, 0, 0, 0, 0, 1]));
        devices.insert(ip(2), MacAddr([2, 0, 0, 0, 0, 2]));

        let fabric = Arc::new(MemoryFabric::new());
        fabric.connect(SwitchId(1));

        let metrics = Arc::new(TestMetrics::default());
        let service = LbEdgeService::new(
            registry,
            devices,
            Arc::clone(&fabric) as _,
            Arc::new(FixedOracle),
            Arc::clone(&metrics) as _,
            LB_TABLE,
        );
        Harness {
            service,
            fabric,
            metrics,
        }
    }

    fn arp_request_frame(target: Ipv4Addr) -> Vec<u8> {
        let arp = ArpPacket {
            opcode: OP_REQUEST,
            sender_mac: client_mac(),
            sender_ip: ip(50),
            target_mac: MacAddr::ZERO,
            target_ip: target,
        };
        EthernetFrame {
            dst: MacAddr::BROADCAST,
            src: client_mac(),
            ethertype: ETHERTYPE_ARP,
            payload: arp.to_bytes(),
        }
        .to_bytes()
    }

    fn tcp_frame(
        src: Ipv4Addr,
        src_port: u16,
        dst: Ipv4Addr,
        dst_port: u16,
        flags: u8,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut segment = vec![0u8; 20];
        segment[0..2].copy_from_slice(&src_port.to_be_bytes());
        segment[2..4].copy_from_slice(&dst_port.to_be_bytes());
        segment[4..8].copy_from_slice(&1000u32.to_be_bytes());
        segment[8..12].copy_from_slice(&2000u32.to_be_bytes());
        segment[12] = 5 << 4;
        segment[13] = flags;
        segment.extend_from_slice(payload);

        EthernetFrame {
            dst: vmac(),
            src: client_mac(),
            ethertype: ETHERTYPE_IPV4,
            payload: Ipv4Packet::build(src, dst, PROTO_TCP, &segment),
        }
        .to_bytes()
    }

    // ── ARP ───────────────────────────────────────────────────────

    #[test]
    fn arp_request_for_vip_gets_reply() {
        let h = harness();
        h.service
            .handle_packet_in(SwitchId(1), 4, &arp_request_frame(vip()));

        let sent = h.fabric.sent_packets();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].out_port, 4);

        let frame = EthernetFrame::parse(&sent[0].frame).unwrap();
        assert_eq!(frame.src, vmac());
        assert_eq!(frame.dst, client_mac());

        let reply = ArpPacket::parse(&frame.payload).unwrap();
        assert_eq!(reply.opcode, OP_REPLY);
        assert_eq!(reply.sender_mac, vmac());
        assert_eq!(reply.sender_ip, vip());
        assert_eq!(reply.target_mac, client_mac());
        assert_eq!(reply.target_ip, ip(50));
        assert_eq!(h.metrics.arp_replies.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn arp_request_for_unknown_ip_ignored() {
        let h = harness();
        h.service
            .handle_packet_in(SwitchId(1), 4, &arp_request_frame(ip(99)));
        assert!(h.fabric.sent_packets().is_empty());
    }

    #[test]
    fn arp_reply_opcode_ignored() {
        let h = harness();
        let arp = ArpPacket {
            opcode: OP_REPLY,
            sender_mac: client_mac(),
            sender_ip: ip(50),
            target_mac: vmac(),
            target_ip: vip(),
        };
        let frame = EthernetFrame {
            dst: vmac(),
            src: client_mac(),
            ethertype: ETHERTYPE_ARP,
            payload: arp.to_bytes(),
        };
        h.service
            .handle_packet_in(SwitchId(1), 4, &frame.to_bytes());
        assert!(h.fabric.sent_packets().is_empty());
    }

    // ── SYN dispatch ──────────────────────────────────────────────

    #[test]
    fn syn_installs_symmetric_rewrite_rules() {
        let h = harness();
        h.service.handle_packet_in(
            SwitchId(1),
            4,
            &tcp_frame(ip(50), 49152, vip(), 80, FLAG_SYN, &[]),
        );

        let flows = h.fabric.flows_in_table(SwitchId(1), LB_TABLE);
        assert_eq!(flows.len(), 2);

        let inbound = flows
            .iter()
            .find(|f| f.matching.ipv4_dst == Some(vip()))
            .expect("inbound rule");
        assert_eq!(
            inbound.matching,
            FlowMatch::tcp_connection(ip(50), 49152, vip(), 80)
        );
        assert_eq!(inbound.priority, PRIORITY_FLOW);
        assert_eq!(inbound.idle_timeout_secs, FLOW_IDLE_TIMEOUT_SECS);
        assert_eq!(inbound.hard_timeout_secs, 0);
        assert_eq!(
            inbound.actions,
            vec![
                FlowAction::SetEthDst(MacAddr([2, 0, 0, 0, 0, 1])),
                FlowAction::SetIpv4Dst(ip(1)),
                FlowAction::GotoTable(FORWARDING_TABLE),
            ]
        );

        let outbound = flows
            .iter()
            .find(|f| f.matching.ipv4_src == Some(ip(1)))
            .expect("outbound rule");
        assert_eq!(
            outbound.matching,
            FlowMatch::tcp_connection(ip(1), 80, ip(50), 49152)
        );
        assert_eq!(
            outbound.actions,
            vec![
                FlowAction::SetEthSrc(vmac()),
                FlowAction::SetIpv4Src(vip()),
                FlowAction::GotoTable(FORWARDING_TABLE),
            ]
        );
    }

    #[test]
    fn consecutive_syns_round_robin_backends() {
        let h = harness();
        h.service.handle_packet_in(
            SwitchId(1),
            4,
            &tcp_frame(ip(50), 49152, vip(), 80, FLAG_SYN, &[]),
        );
        h.service.handle_packet_in(
            SwitchId(1),
            4,
            &tcp_frame(ip(51), 40000, vip(), 80, FLAG_SYN, &[]),
        );

        let flows = h.fabric.flows_in_table(SwitchId(1), LB_TABLE);
        let first = flows
            .iter()
            .find(|f| f.matching.ipv4_src == Some(ip(50)))
            .unwrap();
        let second = flows
            .iter()
            .find(|f| f.matching.ipv4_src == Some(ip(51)))
            .unwrap();
        assert!(first.actions.contains(&FlowAction::SetIpv4Dst(ip(1))));
        assert!(second.actions.contains(&FlowAction::SetIpv4Dst(ip(2))));
    }

    #[test]
    fn syn_with_ack_and_rst_bits_still_dispatches() {
        // Only the SYN bit matters for the dispatch decision.
        let h = harness();
        h.service.handle_packet_in(
            SwitchId(1),
            4,
            &tcp_frame(ip(50), 49152, vip(), 80, FLAG_SYN | FLAG_ACK | FLAG_RST, &[]),
        );
        assert_eq!(h.fabric.flows_in_table(SwitchId(1), LB_TABLE).len(), 2);
        assert!(h.fabric.sent_packets().is_empty());
    }

    #[test]
    fn unresolved_backend_mac_drops_syn() {
        let h = harness();
        // Fresh device index with no entries.
        let service = LbEdgeService::new(
            Arc::new(VipRegistry::new(
                parse_instances("10.0.0.100 02:00:00:00:00:64 10.0.0.9").0,
            )),
            Arc::new(StaticDeviceIndex::new()),
            Arc::clone(&h.fabric) as _,
            Arc::new(FixedOracle),
            Arc::new(TestMetrics::default()),
            LB_TABLE,
        );
        service.handle_packet_in(
            SwitchId(1),
            4,
            &tcp_frame(ip(50), 49152, vip(), 80, FLAG_SYN, &[]),
        );
        assert!(h.fabric.flows_in_table(SwitchId(1), LB_TABLE).is_empty());
    }

    // ── Stray TCP ─────────────────────────────────────────────────

    #[test]
    fn non_syn_to_vip_triggers_reset() {
        let h = harness();
        h.service.handle_packet_in(
            SwitchId(1),
            4,
            &tcp_frame(ip(50), 49152, vip(), 80, FLAG_ACK, &[0xab; 5]),
        );

        assert!(h.fabric.flows_in_table(SwitchId(1), LB_TABLE).is_empty());
        let sent = h.fabric.sent_packets();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].out_port, 4);

        let frame = EthernetFrame::parse(&sent[0].frame).unwrap();
        assert_eq!(frame.src, vmac());
        assert_eq!(frame.dst, client_mac());
        assert_eq!(frame.ethertype, ETHERTYPE_IPV4);

        let datagram = Ipv4Packet::parse(&frame.payload).unwrap();
        assert_eq!(datagram.src, vip());
        assert_eq!(datagram.dst, ip(50));

        let reset = TcpSegment::parse(&datagram.payload).unwrap();
        assert_eq!(reset.flags & FLAG_RST, FLAG_RST);
        assert_eq!(reset.src_port, 80);
        assert_eq!(reset.dst_port, 49152);
        assert_eq!(reset.seq, 2000); // original ack
        assert_eq!(reset.ack, 1005); // original seq + payload
        assert_eq!(h.metrics.resets.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn tcp_to_unknown_destination_ignored() {
        let h = harness();
        h.service.handle_packet_in(
            SwitchId(1),
            4,
            &tcp_frame(ip(50), 49152, ip(99), 80, FLAG_ACK, &[]),
        );
        assert!(h.fabric.sent_packets().is_empty());
        assert!(h.fabric.flows_in_table(SwitchId(1), LB_TABLE).is_empty());
    }

    #[test]
    fn non_tcp_to_vip_ignored() {
        let h = harness();
        let frame = EthernetFrame {
            dst: vmac(),
            src: client_mac(),
            ethertype: ETHERTYPE_IPV4,
            payload: Ipv4Packet::build(ip(50), vip(), 17, &[0; 8]), // UDP
        };
        h.service
            .handle_packet_in(SwitchId(1), 4, &frame.to_bytes());
        assert!(h.fabric.sent_packets().is_empty());
    }

    // ── Malformed input ───────────────────────────────────────────

    #[test]
    fn malformed_frame_counts_violation() {
        let h = harness();
        h.service.handle_packet_in(SwitchId(1), 4, &[0u8; 5]);
        assert_eq!(h.metrics.violations.load(Ordering::Relaxed), 1);
        assert!(h.fabric.sent_packets().is_empty());
    }

    #[test]
    fn truncated_tcp_counts_violation() {
        let h = harness();
        let frame = EthernetFrame {
            dst: vmac(),
            src: client_mac(),
            ethertype: ETHERTYPE_IPV4,
            payload: Ipv4Packet::build(ip(50), vip(), PROTO_TCP, &[0; 7]),
        };
        h.service
            .handle_packet_in(SwitchId(1), 4, &frame.to_bytes());
        assert_eq!(h.metrics.violations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unknown_ethertype_ignored() {
        let h = harness();
        let frame = EthernetFrame {
            dst: vmac(),
            src: client_mac(),
            ethertype: 0x86dd, // IPv6
            payload: vec![0; 40],
        };
        h.service
            .handle_packet_in(SwitchId(1), 4, &frame.to_bytes());
        assert!(h.fabric.sent_packets().is_empty());
        assert_eq!(h.metrics.violations.load(Ordering::Relaxed), 0);
    }
}
