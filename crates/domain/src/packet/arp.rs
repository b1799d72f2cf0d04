use std::net::Ipv4Addr;

use crate::common::entity::MacAddr;

use super::error::PacketError;

pub const OP_REQUEST: u16 = 1;
pub const OP_REPLY: u16 = 2;

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;
const PACKET_LEN: usize = 28;

/// An ARP packet for IPv4 over Ethernet. Other hardware/protocol
/// combinations are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < PACKET_LEN {
            return Err(PacketError::Truncated {
                layer: "arp",
                needed: PACKET_LEN,
                have: bytes.len(),
            });
        }
        let htype = u16::from_be_bytes([bytes[0], bytes[1]]);
        let ptype = u16::from_be_bytes([bytes[2], bytes[3]]);
        let hlen = bytes[4];
        let plen = bytes[5];
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(PacketError::Unsupported {
                layer: "arp",
                detail: format!("htype={htype} ptype={ptype:#06x} hlen={hlen} plen={plen}"),
            });
        }

        let mut sender_mac = [0u8; 6];
        let mut target_mac = [0u8; 6];
        sender_mac.copy_from_slice(&bytes[8..14]);
        target_mac.copy_from_slice(&bytes[18..24]);

        Ok(Self {
            opcode: u16::from_be_bytes([bytes[6], bytes[7]]),
            sender_mac: MacAddr(sender_mac),
            sender_ip: Ipv4Addr::new(bytes[14], bytes[15], bytes[16], bytes[17]),
            target_mac: MacAddr(target_mac),
            target_ip: Ipv4Addr::new(bytes[24], bytes[25], bytes[26], bytes[27]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PACKET_LEN);
        out.extend_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        out.extend_from_slice(&PTYPE_IPV4.to_be_bytes());
        out.push(6);
        out.push(4);
        out.extend_from_slice(&self.opcode.to_be_bytes());
        out.extend_from_slice(&self.sender_mac.octets());
        out.extend_from_slice(&self.sender_ip.octets());
        out.extend_from_slice(&self.target_mac.octets());
        out.extend_from_slice(&self.target_ip.octets());
        out
    }

    pub fn is_request(&self) -> bool {
        self.opcode == OP_REQUEST
    }

    /// Build the reply to this request announcing `vmac` as the owner of
    /// `vip`: the original sender becomes the target.
    pub fn reply(&self, vip: Ipv4Addr, vmac: MacAddr) -> ArpPacket {
        ArpPacket {
            opcode: OP_REPLY,
            sender_mac: vmac,
            sender_ip: vip,
            target_mac: self.sender_mac,
            target_ip: self.sender_ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ArpPacket {
        ArpPacket {
            opcode: OP_REQUEST,
            sender_mac: MacAddr([0xaa; 6]),
            sender_ip: Ipv4Addr::new(10, 0, 0, 50),
            target_mac: MacAddr::ZERO,
            target_ip: Ipv4Addr::new(10, 0, 0, 100),
        }
    }

    #[test]
    fn roundtrip() {
        let arp = request();
        assert_eq!(ArpPacket::parse(&arp.to_bytes()).unwrap(), arp);
    }

    #[test]
    fn parse_rejects_truncated() {
        assert!(matches!(
            ArpPacket::parse(&[0u8; 27]),
            Err(PacketError::Truncated { layer: "arp", .. })
        ));
    }

    #[test]
    fn parse_rejects_non_ethernet_ipv4() {
        let mut bytes = request().to_bytes();
        bytes[1] = 6; // IEEE 802 hardware type
        assert!(matches!(
            ArpPacket::parse(&bytes),
            Err(PacketError::Unsupported { layer: "arp", .. })
        ));
    }

    #[test]
    fn reply_swaps_sender_and_target() {
        let vmac = MacAddr([2, 0, 0, 0, 0, 0x64]);
        let vip = Ipv4Addr::new(10, 0, 0, 100);
        let reply = request().reply(vip, vmac);

        assert_eq!(reply.opcode, OP_REPLY);
        assert_eq!(reply.sender_mac, vmac);
        assert_eq!(reply.sender_ip, vip);
        assert_eq!(reply.target_mac, MacAddr([0xaa; 6]));
        assert_eq!(reply.target_ip, Ipv4Addr::new(10, 0, 0, 50));
        assert!(!reply.is_request());
    }
}
