mod dns;
mod ethernet;
mod ipv4;
mod ipv6;
mod transport;

pub use ipv4::decode_ipv4;
pub use ipv6::decode_ipv6;

use std::net::IpAddr;

use bytes::Bytes;

use crate::error::DecodeError;
use crate::frame::{Frame, LinkType};

/// What remains after the link-layer header is stripped: the L3 protocol
/// and its payload. `PacketDecoder` dispatches on this.
pub enum L3Payload {
    Ipv4(Bytes),
    Ipv6(Bytes),
}

/// Peels the Ethernet II or Linux cooked-capture header off `frame.data`,
/// locating the L3 payload. Unlike a fixed 14-byte offset, this branches on
/// `frame.link_type` so non-Ethernet captures (e.g. an `any`-device capture)
/// are handled correctly.
pub fn decode_link_layer(frame: &Frame) -> Result<L3Payload, DecodeError> {
    ethernet::decode(frame.link_type, &frame.data)
}

pub use transport::{
    decode_tcp, decode_udp, TcpDatagram, UdpDatagram, TCP_FLAG_ACK, TCP_FLAG_FIN, TCP_FLAG_RST,
    TCP_FLAG_SYN,
};

/// Routing decision for an IPv4/IPv6 payload: either it's a fragment that
/// must go to a defragger, or it's a complete datagram ready for transport
/// decode.
pub enum IpRouting {
    Fragment(crate::defrag::IpFragmentKind),
    Complete {
        src: IpAddr,
        dst: IpAddr,
        protocol: u8,
        payload: Bytes,
    },
}

pub use dns::decode_dns_message;
