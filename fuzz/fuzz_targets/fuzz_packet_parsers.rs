#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::packet::arp::ArpPacket;
use domain::packet::ethernet::{EthernetFrame, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use domain::packet::ipv4::{Ipv4Packet, PROTO_TCP};
use domain::packet::tcp::TcpSegment;

// Drive the full packet-in parse chain the edge handler uses. Parsers must
// never panic on arbitrary bytes, and whatever parses must re-serialize to
// something that parses back to the same value.
fuzz_target!(|data: &[u8]| {
    let Ok(eth) = EthernetFrame::parse(data) else {
        return;
    };
    let reparsed = EthernetFrame::parse(&eth.to_bytes()).expect("serialized frame must parse");
    assert_eq!(reparsed, eth);

    match eth.ethertype {
        ETHERTYPE_ARP => {
            if let Ok(arp) = ArpPacket::parse(&eth.payload) {
                let reply = arp.reply(arp.target_ip, eth.dst);
                let reparsed =
                    ArpPacket::parse(&reply.to_bytes()).expect("built reply must parse");
                assert_eq!(reparsed, reply);
            }
        }
        ETHERTYPE_IPV4 => {
            let Ok(ip) = Ipv4Packet::parse(&eth.payload) else {
                return;
            };
            if ip.protocol != PROTO_TCP {
                return;
            }
            if let Ok(tcp) = TcpSegment::parse(&ip.payload) {
                let reset = tcp.reset_reply(ip.dst, ip.src);
                let segment = TcpSegment::parse(&reset).expect("built reset must parse");
                assert_eq!(segment.payload_len, 0);
            }
        }
        _ => {}
    }
});
