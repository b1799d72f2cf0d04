use std::net::Ipv4Addr;

use super::error::PacketError;
use super::internet_checksum;
use super::ipv4::PROTO_TCP;

pub const FLAG_FIN: u8 = 0x01;
pub const FLAG_SYN: u8 = 0x02;
pub const FLAG_RST: u8 = 0x04;
pub const FLAG_PSH: u8 = 0x08;
pub const FLAG_ACK: u8 = 0x10;

const MIN_HEADER_LEN: usize = 20;

/// Parsed TCP header. The payload itself is not retained, only its length,
/// which reset synthesis needs for the acknowledgment number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    pub payload_len: usize,
}

impl TcpSegment {
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: "tcp",
                needed: MIN_HEADER_LEN,
                have: bytes.len(),
            });
        }
        let data_offset = usize::from(bytes[12] >> 4) * 4;
        if data_offset < MIN_HEADER_LEN {
            return Err(PacketError::Unsupported {
                layer: "tcp",
                detail: format!("data offset {data_offset}"),
            });
        }
        if bytes.len() < data_offset {
            return Err(PacketError::Truncated {
                layer: "tcp",
                needed: data_offset,
                have: bytes.len(),
            });
        }
        Ok(Self {
            src_port: u16::from_be_bytes([bytes[0], bytes[1]]),
            dst_port: u16::from_be_bytes([bytes[2], bytes[3]]),
            seq: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ack: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            flags: bytes[13],
            payload_len: bytes.len() - data_offset,
        })
    }

    pub fn is_syn(&self) -> bool {
        self.flags & FLAG_SYN != 0
    }

    pub fn has_ack(&self) -> bool {
        self.flags & FLAG_ACK != 0
    }

    /// Synthesize the reset for this segment, to be sent from `src_ip`
    /// (the VIP) back to `dst_ip` (the original sender).
    ///
    /// Ports are swapped; the sequence number is the peer's acknowledgment
    /// number (0 when the ACK flag was absent) and the acknowledgment number
    /// is the peer's sequence plus its payload length. Zero window, zero
    /// options, zero payload.
    pub fn reset_reply(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Vec<u8> {
        let seq = if self.has_ack() { self.ack } else { 0 };
        let ack = self.seq.wrapping_add(self.payload_len as u32);
        build_segment(
            src_ip,
            dst_ip,
            self.dst_port,
            self.src_port,
            seq,
            ack,
            FLAG_RST | FLAG_ACK,
        )
    }
}

/// Serialize a bare 20-byte segment with the checksum computed over the
/// IPv4 pseudo-header.
fn build_segment(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    flags: u8,
) -> Vec<u8> {
    let mut header = [0u8; MIN_HEADER_LEN];
    header[0..2].copy_from_slice(&src_port.to_be_bytes());
    header[2..4].copy_from_slice(&dst_port.to_be_bytes());
    header[4..8].copy_from_slice(&seq.to_be_bytes());
    header[8..12].copy_from_slice(&ack.to_be_bytes());
    header[12] = (5 << 4) as u8; // data offset, no options
    header[13] = flags;
    // Window, checksum, urgent pointer stay zero until checksummed.

    let mut pseudo = [0u8; 12];
    pseudo[0..4].copy_from_slice(&src_ip.octets());
    pseudo[4..8].copy_from_slice(&dst_ip.octets());
    pseudo[9] = PROTO_TCP;
    pseudo[10..12].copy_from_slice(&(MIN_HEADER_LEN as u16).to_be_bytes());

    let checksum = internet_checksum(&[&pseudo, &header]);
    header[16..18].copy_from_slice(&checksum.to_be_bytes());
    header.to_vec()
}
