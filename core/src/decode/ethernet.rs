use bytes::Bytes;

use super::L3Payload;
use crate::error::{DecodeError, EthernetError};
use crate::frame::LinkType;

const ETHERNET_HEADER_LEN: usize = 14;
const ETHERNET_ETHERTYPE_OFFSET: usize = 12;

const SLL_HEADER_LEN: usize = 16;
const SLL_PROTOCOL_OFFSET: usize = 14;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
/// 802.1Q VLAN tag ethertype; one tag is unwrapped before re-reading the
/// real ethertype, matching what real captures commonly contain.
const ETHERTYPE_VLAN: u16 = 0x8100;

pub fn decode(link_type: LinkType, data: &Bytes) -> Result<L3Payload, DecodeError> {
    match link_type {
        LinkType::Ethernet => decode_ethernet(data),
        LinkType::LinuxCooked => decode_linux_cooked(data),
    }
}

fn decode_ethernet(data: &Bytes) -> Result<L3Payload, DecodeError> {
    if data.len() < ETHERNET_HEADER_LEN {
        return Err(EthernetError::TooShort { len: data.len() }.into());
    }
    let mut ethertype_offset = ETHERNET_ETHERTYPE_OFFSET;
    let mut header_len = ETHERNET_HEADER_LEN;
    let mut ethertype = read_u16(data, ethertype_offset)?;
    if ethertype == ETHERTYPE_VLAN {
        header_len += 4;
        ethertype_offset += 4;
        if data.len() < header_len {
            return Err(EthernetError::TooShort { len: data.len() }.into());
        }
        ethertype = read_u16(data, ethertype_offset)?;
    }
    payload_for_ethertype(ethertype, data.slice(header_len..))
}

fn decode_linux_cooked(data: &Bytes) -> Result<L3Payload, DecodeError> {
    if data.len() < SLL_HEADER_LEN {
        return Err(EthernetError::TooShortCooked { len: data.len() }.into());
    }
    let ethertype = read_u16(data, SLL_PROTOCOL_OFFSET)?;
    payload_for_ethertype(ethertype, data.slice(SLL_HEADER_LEN..))
}

fn payload_for_ethertype(ethertype: u16, payload: Bytes) -> Result<L3Payload, DecodeError> {
    match ethertype {
        ETHERTYPE_IPV4 => Ok(L3Payload::Ipv4(payload)),
        ETHERTYPE_IPV6 => Ok(L3Payload::Ipv6(payload)),
        other => Err(EthernetError::UnsupportedEthertype(other).into()),
    }
}

fn read_u16(data: &Bytes, offset: usize) -> Result<u16, DecodeError> {
    data.get(offset..offset + 2)
        .map(|s| u16::from_be_bytes([s[0], s[1]]))
        .ok_or_else(|| EthernetError::TooShort { len: data.len() }.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_frame(ethertype: u16, payload: &[u8]) -> Bytes {
        let mut buf = vec![0u8; 12];
        buf.extend_from_slice(&ethertype.to_be_bytes());
        buf.extend_from_slice(payload);
        Bytes::from(buf)
    }

    #[test]
    fn decodes_ipv4_ethertype() {
        let frame = eth_frame(ETHERTYPE_IPV4, &[1, 2, 3]);
        match decode(LinkType::Ethernet, &frame).unwrap() {
            L3Payload::Ipv4(payload) => assert_eq!(&payload[..], &[1, 2, 3]),
            _ => panic!("expected ipv4"),
        }
    }

    #[test]
    fn rejects_unsupported_ethertype() {
        let frame = eth_frame(0x1234, &[]);
        assert!(matches!(
            decode(LinkType::Ethernet, &frame),
            Err(DecodeError::Ethernet(EthernetError::UnsupportedEthertype(0x1234)))
        ));
    }

    #[test]
    fn too_short_frame_is_rejected() {
        let frame = Bytes::from_static(&[0u8; 4]);
        assert!(matches!(
            decode(LinkType::Ethernet, &frame),
            Err(DecodeError::Ethernet(EthernetError::TooShort { .. }))
        ));
    }
}
