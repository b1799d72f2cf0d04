use std::net::Ipv4Addr;

use super::error::PacketError;
use super::internet_checksum;

pub const PROTO_TCP: u8 = 6;

const MIN_HEADER_LEN: usize = 20;
const DEFAULT_TTL: u8 = 64;

/// Parsed IPv4 header plus its payload. Options are skipped, not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub payload: Vec<u8>,
}

impl Ipv4Packet {
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: "ipv4",
                needed: MIN_HEADER_LEN,
                have: bytes.len(),
            });
        }
        let version = bytes[0] >> 4;
        if version != 4 {
            return Err(PacketError::Unsupported {
                layer: "ipv4",
                detail: format!("version {version}"),
            });
        }
        let header_len = usize::from(bytes[0] & 0x0f) * 4;
        if header_len < MIN_HEADER_LEN {
            return Err(PacketError::Unsupported {
                layer: "ipv4",
                detail: format!("header length {header_len}"),
            });
        }
        if bytes.len() < header_len {
            return Err(PacketError::Truncated {
                layer: "ipv4",
                needed: header_len,
                have: bytes.len(),
            });
        }
        let total_len = usize::from(u16::from_be_bytes([bytes[2], bytes[3]]));
        if total_len < header_len {
            return Err(PacketError::Unsupported {
                layer: "ipv4",
                detail: format!("total length {total_len} below header length {header_len}"),
            });
        }
        // Tolerate trailing frame padding: slice to the declared total
        // length, clamped to what is actually present.
        let end = total_len.min(bytes.len());

        Ok(Self {
            src: Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]),
            dst: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
            protocol: bytes[9],
            payload: bytes[header_len..end].to_vec(),
        })
    }

    /// Serialize a datagram around `payload`: no options, DSCP 0, TTL 64,
    /// header checksum filled in.
    pub fn build(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> Vec<u8> {
        let total_len = (MIN_HEADER_LEN + payload.len()) as u16;
        let mut header = [0u8; MIN_HEADER_LEN];
        header[0] = 0x45; // version 4, 5-word header
        header[2..4].copy_from_slice(&total_len.to_be_bytes());
        header[8] = DEFAULT_TTL;
        header[9] = protocol;
        header[12..16].copy_from_slice(&src.octets());
        header[16..20].copy_from_slice(&dst.octets());
        let checksum = internet_checksum(&[&header]);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());

        let mut out = Vec::with_capacity(MIN_HEADER_LEN + payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(payload);
        out
    }
}
