use std::net::{IpAddr, Ipv4Addr};
use std::time::SystemTime;

use bytes::Bytes;
use log::trace;

use super::IpRouting;
use crate::defrag::{IpFragmentKind, Ipv4Fragment};
use crate::error::{DecodeError, Ipv4Error};

const MIN_IPV4_HEADER_LEN: usize = 20;

const FLAG_MORE_FRAGMENTS: u16 = 0x2000;
const FRAGMENT_OFFSET_MASK: u16 = 0x1FFF;

/// Parses an IPv4 header and decides whether the payload is a fragment that
/// must go to the defragger, or a complete datagram ready for transport
/// decode. Mirrors §4.1 step 2 of the pipeline's frame-handling algorithm.
pub fn decode_ipv4(
    payload: &Bytes,
    timestamp: Option<SystemTime>,
) -> Result<IpRouting, DecodeError> {
    if payload.len() < MIN_IPV4_HEADER_LEN {
        return Err(Ipv4Error::TooShort {
            len: payload.len(),
        }
        .into());
    }
    let version = payload[0] >> 4;
    if version != 4 {
        return Err(Ipv4Error::WrongVersion(version).into());
    }
    let ihl = (payload[0] & 0x0F) as usize * 4;
    if ihl < MIN_IPV4_HEADER_LEN {
        return Err(Ipv4Error::InvalidIhl((payload[0] & 0x0F)).into());
    }
    let total_length = u16::from_be_bytes([payload[2], payload[3]]) as usize;
    let identifier = u16::from_be_bytes([payload[4], payload[5]]);
    let flags_and_offset = u16::from_be_bytes([payload[6], payload[7]]);
    let more_fragments = flags_and_offset & FLAG_MORE_FRAGMENTS != 0;
    let fragment_offset = (flags_and_offset & FRAGMENT_OFFSET_MASK) * 8;
    let protocol = payload[9];
    let src = Ipv4Addr::new(payload[12], payload[13], payload[14], payload[15]);
    let dst = Ipv4Addr::new(payload[16], payload[17], payload[18], payload[19]);

    if payload.len() < ihl || total_length < ihl || total_length > payload.len() {
        return Err(Ipv4Error::TruncatedPayload {
            declared: total_length,
            available: payload.len(),
        }
        .into());
    }

    let body = payload.slice(ihl..total_length);

    if more_fragments || fragment_offset > 0 {
        trace!(
            "ipv4 fragment id={identifier} src={src} dst={dst} offset={fragment_offset} more={more_fragments}"
        );
        return Ok(IpRouting::Fragment(IpFragmentKind::V4(Ipv4Fragment {
            identifier,
            src,
            dst,
            protocol,
            fragment_offset,
            more_fragments,
            payload: body,
            timestamp,
        })));
    }

    Ok(IpRouting::Complete {
        src: IpAddr::V4(src),
        dst: IpAddr::V4(dst),
        protocol,
        payload: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_header(
        total_length: u16,
        identifier: u16,
        flags_and_offset: u16,
        protocol: u8,
        payload_len: usize,
    ) -> Bytes {
        let mut buf = vec![0u8; 20 + payload_len];
        buf[0] = 0x45; // version 4, IHL 5
        buf[2..4].copy_from_slice(&total_length.to_be_bytes());
        buf[4..6].copy_from_slice(&identifier.to_be_bytes());
        buf[6..8].copy_from_slice(&flags_and_offset.to_be_bytes());
        buf[9] = protocol;
        buf[12..16].copy_from_slice(&[127, 0, 0, 1]);
        buf[16..20].copy_from_slice(&[127, 0, 0, 2]);
        Bytes::from(buf)
    }

    #[test]
    fn unfragmented_datagram_is_complete() {
        let payload = ipv4_header(28, 1, 0, 17, 8);
        match decode_ipv4(&payload, None).unwrap() {
            IpRouting::Complete {
                protocol, payload, ..
            } => {
                assert_eq!(protocol, 17);
                assert_eq!(payload.len(), 8);
            }
            _ => panic!("expected complete datagram"),
        }
    }

    #[test]
    fn more_fragments_flag_routes_to_defragger() {
        let payload = ipv4_header(1500, 42, FLAG_MORE_FRAGMENTS, 17, 1480);
        match decode_ipv4(&payload, None).unwrap() {
            IpRouting::Fragment(IpFragmentKind::V4(frag)) => {
                assert_eq!(frag.identifier, 42);
                assert!(frag.more_fragments);
                assert_eq!(frag.fragment_offset, 0);
            }
            _ => panic!("expected fragment"),
        }
    }

    #[test]
    fn nonzero_offset_routes_to_defragger_even_without_more_fragments() {
        let payload = ipv4_header(1000, 42, 100, 17, 980);
        match decode_ipv4(&payload, None).unwrap() {
            IpRouting::Fragment(IpFragmentKind::V4(frag)) => {
                assert_eq!(frag.fragment_offset, 800);
                assert!(!frag.more_fragments);
            }
            _ => panic!("expected fragment"),
        }
    }
}
