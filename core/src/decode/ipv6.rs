use std::net::{IpAddr, Ipv6Addr};
use std::time::SystemTime;

use bytes::Bytes;

use super::IpRouting;
use crate::defrag::{IpFragmentKind, Ipv6Fragment};
use crate::error::{DecodeError, Ipv6Error};

const IPV6_HEADER_LEN: usize = 40;

const NEXT_HEADER_HOP_BY_HOP: u8 = 0;
const NEXT_HEADER_ROUTING: u8 = 43;
const NEXT_HEADER_FRAGMENT: u8 = 44;
const NEXT_HEADER_DEST_OPTIONS: u8 = 60;

/// Extension headers that must be walked past before reaching either a
/// Fragment header or the final transport/terminal header. A chain longer
/// than this is almost certainly malformed or adversarial.
const MAX_EXTENSION_HOPS: usize = 8;

/// Parses an IPv6 header and walks its extension header chain looking for a
/// Fragment header, per §4.1 step 3. Unlike assuming Fragment is always
/// first, every hop-by-hop/routing/destination-options header encountered
/// before it is skipped, matching what RFC 8200 actually permits.
pub fn decode_ipv6(
    payload: &Bytes,
    timestamp: Option<SystemTime>,
) -> Result<IpRouting, DecodeError> {
    if payload.len() < IPV6_HEADER_LEN {
        return Err(Ipv6Error::TooShort {
            len: payload.len(),
        }
        .into());
    }
    let version = payload[0] >> 4;
    if version != 6 {
        return Err(Ipv6Error::WrongVersion(version).into());
    }
    let payload_length = u16::from_be_bytes([payload[4], payload[5]]) as usize;
    let mut next_header = payload[6];
    let src = Ipv6Addr::from(<[u8; 16]>::try_from(&payload[8..24]).unwrap());
    let dst = Ipv6Addr::from(<[u8; 16]>::try_from(&payload[24..40]).unwrap());

    if IPV6_HEADER_LEN + payload_length > payload.len() {
        return Err(Ipv6Error::TruncatedPayload {
            declared: payload_length,
            available: payload.len(),
        }
        .into());
    }

    let mut cursor = IPV6_HEADER_LEN;
    let end = IPV6_HEADER_LEN + payload_length;

    for _ in 0..MAX_EXTENSION_HOPS {
        match next_header {
            NEXT_HEADER_HOP_BY_HOP | NEXT_HEADER_ROUTING | NEXT_HEADER_DEST_OPTIONS => {
                if end - cursor < 8 {
                    return Err(Ipv6Error::TruncatedExtensionHeader(next_header).into());
                }
                let this_next_header = payload[cursor];
                let ext_len_words = payload[cursor + 1] as usize;
                let ext_len = (ext_len_words + 1) * 8;
                if end - cursor < ext_len {
                    return Err(Ipv6Error::TruncatedExtensionHeader(next_header).into());
                }
                cursor += ext_len;
                next_header = this_next_header;
            }
            NEXT_HEADER_FRAGMENT => {
                if end - cursor < 8 {
                    return Err(Ipv6Error::TruncatedExtensionHeader(next_header).into());
                }
                let this_next_header = payload[cursor];
                let fragment_offset =
                    (u16::from_be_bytes([payload[cursor + 2], payload[cursor + 3]]) >> 3) * 8;
                let more_fragments = payload[cursor + 3] & 0x01 != 0;
                let identifier = u32::from_be_bytes([
                    payload[cursor + 4],
                    payload[cursor + 5],
                    payload[cursor + 6],
                    payload[cursor + 7],
                ]);
                let body = payload.slice(cursor + 8..end);
                return Ok(IpRouting::Fragment(IpFragmentKind::V6(Ipv6Fragment {
                    identifier,
                    src,
                    dst,
                    next_header: this_next_header,
                    fragment_offset,
                    more_fragments,
                    payload: body,
                    timestamp,
                })));
            }
            terminal => {
                let body = payload.slice(cursor..end);
                return Ok(IpRouting::Complete {
                    src: IpAddr::V6(src),
                    dst: IpAddr::V6(dst),
                    protocol: terminal,
                    payload: body,
                });
            }
        }
    }
    Err(Ipv6Error::ExtensionChainTooLong(MAX_EXTENSION_HOPS).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv6_header(next_header: u8, payload_length: u16, payload: &[u8]) -> Bytes {
        let mut buf = vec![0u8; 40];
        buf[0] = 0x60;
        buf[4..6].copy_from_slice(&payload_length.to_be_bytes());
        buf[6] = next_header;
        buf[8..24].copy_from_slice(&[0u8; 16]);
        buf[24..40].copy_from_slice(&[0u8; 16]);
        buf.extend_from_slice(payload);
        Bytes::from(buf)
    }

    #[test]
    fn terminal_udp_header_is_complete() {
        let frame = ipv6_header(17, 8, &[0u8; 8]);
        match decode_ipv6(&frame, None).unwrap() {
            IpRouting::Complete { protocol, .. } => assert_eq!(protocol, 17),
            _ => panic!("expected complete"),
        }
    }

    #[test]
    fn fragment_header_is_detected_after_hop_by_hop() {
        let mut ext_and_frag = vec![44u8, 0, 0, 0, 0, 0, 0, 0]; // hop-by-hop: next=fragment, len=0
        ext_and_frag.extend_from_slice(&[17, 0, 0, 0, 0, 0, 0, 1]); // fragment header: next=udp, offset/mf=0, id=1
        ext_and_frag.extend_from_slice(&[0u8; 8]); // udp payload
        let frame = ipv6_header(0, ext_and_frag.len() as u16, &ext_and_frag);
        match decode_ipv6(&frame, None).unwrap() {
            IpRouting::Fragment(IpFragmentKind::V6(frag)) => {
                assert_eq!(frag.next_header, 17);
                assert_eq!(frag.identifier, 1);
            }
            _ => panic!("expected fragment"),
        }
    }
}
