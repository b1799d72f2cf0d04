use std::net::Ipv4Addr;

use crate::common::entity::{MacAddr, PortNo};

/// Identifier of a flow table inside a switch pipeline.
pub type TableId = u8;

/// Priority of the table-miss default and of shortest-path entries.
pub const PRIORITY_DEFAULT: u16 = 1;
/// Priority of the per-VIP catch rules; above the table-miss default.
pub const PRIORITY_VIP: u16 = 2;
/// Priority of per-connection rewrite rules; above everything else.
pub const PRIORITY_FLOW: u16 = u16::MAX;

/// Idle timeout for per-connection rewrite rules, so stale flows
/// self-evict from the switch.
pub const FLOW_IDLE_TIMEOUT_SECS: u16 = 20;

/// Output target of a flow action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Physical(PortNo),
    Controller,
}

/// Match fields supported by the pipeline. `None` fields are wildcards;
/// the default value matches every packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatch {
    pub eth_type: Option<u16>,
    pub arp_tpa: Option<Ipv4Addr>,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub ip_proto: Option<u8>,
    pub tcp_src: Option<u16>,
    pub tcp_dst: Option<u16>,
}

impl FlowMatch {
    /// Match every packet (the table-miss rule).
    pub fn any() -> Self {
        Self::default()
    }

    /// Match IPv4 traffic to `dst`.
    pub fn ipv4_to(dst: Ipv4Addr) -> Self {
        Self {
            eth_type: Some(crate::packet::ethernet::ETHERTYPE_IPV4),
            ipv4_dst: Some(dst),
            ..Self::default()
        }
    }

    /// Match ARP requests asking for `target`.
    pub fn arp_asking_for(target: Ipv4Addr) -> Self {
        Self {
            eth_type: Some(crate::packet::ethernet::ETHERTYPE_ARP),
            arp_tpa: Some(target),
            ..Self::default()
        }
    }

    /// Match one direction of a TCP connection.
    pub fn tcp_connection(
        src: Ipv4Addr,
        src_port: u16,
        dst: Ipv4Addr,
        dst_port: u16,
    ) -> Self {
        Self {
            eth_type: Some(crate::packet::ethernet::ETHERTYPE_IPV4),
            ipv4_src: Some(src),
            ipv4_dst: Some(dst),
            ip_proto: Some(crate::packet::ipv4::PROTO_TCP),
            tcp_src: Some(src_port),
            tcp_dst: Some(dst_port),
            ..Self::default()
        }
    }
}

/// An action applied to matching packets, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Output(Port),
    SetEthSrc(MacAddr),
    SetEthDst(MacAddr),
    SetIpv4Src(Ipv4Addr),
    SetIpv4Dst(Ipv4Addr),
    GotoTable(TableId),
}

/// A complete flow-mod as handed to the switch command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub table: TableId,
    pub priority: u16,
    pub matching: FlowMatch,
    pub actions: Vec<FlowAction>,
    pub idle_timeout_secs: u16,
    pub hard_timeout_secs: u16,
}

impl FlowMod {
    /// A permanent rule (no timeouts).
    pub fn new(
        table: TableId,
        priority: u16,
        matching: FlowMatch,
        actions: Vec<FlowAction>,
    ) -> Self {
        Self {
            table,
            priority,
            matching,
            actions,
            idle_timeout_secs: 0,
            hard_timeout_secs: 0,
        }
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, secs: u16) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_are_ordered() {
        assert!(PRIORITY_DEFAULT < PRIORITY_VIP);
        assert!(PRIORITY_VIP < PRIORITY_FLOW);
    }

    #[test]
    fn any_match_is_all_wildcards() {
        assert_eq!(FlowMatch::any(), FlowMatch::default());
    }

    #[test]
    fn ipv4_to_sets_ethertype() {
        let m = FlowMatch::ipv4_to(Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(m.eth_type, Some(0x0800));
        assert_eq!(m.ipv4_dst, Some(Ipv4Addr::new(10, 0, 0, 3)));
        assert_eq!(m.ipv4_src, None);
    }

    #[test]
    fn tcp_connection_pins_five_tuple() {
        let m = FlowMatch::tcp_connection(
            Ipv4Addr::new(10, 0, 0, 50),
            49152,
            Ipv4Addr::new(10, 0, 0, 100),
            80,
        );
        assert_eq!(m.ip_proto, Some(6));
        assert_eq!(m.tcp_src, Some(49152));
        assert_eq!(m.tcp_dst, Some(80));
    }

    #[test]
    fn flow_mod_defaults_to_permanent() {
        let flow = FlowMod::new(0, PRIORITY_VIP, FlowMatch::any(), vec![]);
        assert_eq!(flow.idle_timeout_secs, 0);
        assert_eq!(flow.hard_timeout_secs, 0);

        let flow = flow.with_idle_timeout(FLOW_IDLE_TIMEOUT_SECS);
        assert_eq!(flow.idle_timeout_secs, 20);
    }
}
