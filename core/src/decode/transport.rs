use bytes::Bytes;

use crate::error::TransportError;

const UDP_HEADER_LEN: usize = 8;
const MIN_TCP_HEADER_LEN: usize = 20;

pub const TCP_FLAG_FIN: u8 = 0x01;
pub const TCP_FLAG_SYN: u8 = 0x02;
pub const TCP_FLAG_RST: u8 = 0x04;
pub const TCP_FLAG_ACK: u8 = 0x10;

pub struct UdpDatagram {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: Bytes,
}

/// Only sequence, flags, ports and payload are kept, per §6's "only
/// sequence, flags, ports, and payload are required" for TCP.
pub struct TcpDatagram {
    pub src_port: u16,
    pub dst_port: u16,
    pub sequence: u32,
    pub flags: u8,
    pub payload: Bytes,
}

impl TcpDatagram {
    pub fn fin(&self) -> bool {
        self.flags & TCP_FLAG_FIN != 0
    }
    pub fn syn(&self) -> bool {
        self.flags & TCP_FLAG_SYN != 0
    }
    pub fn rst(&self) -> bool {
        self.flags & TCP_FLAG_RST != 0
    }
}

pub fn decode_udp(payload: &Bytes) -> Result<UdpDatagram, TransportError> {
    if payload.len() < UDP_HEADER_LEN {
        return Err(TransportError::UdpTooShort {
            len: payload.len(),
        });
    }
    let src_port = u16::from_be_bytes([payload[0], payload[1]]);
    let dst_port = u16::from_be_bytes([payload[2], payload[3]]);
    let length = u16::from_be_bytes([payload[4], payload[5]]) as usize;
    if length < UDP_HEADER_LEN || length > payload.len() {
        return Err(TransportError::UdpTruncated {
            declared: length,
            available: payload.len(),
        });
    }
    Ok(UdpDatagram {
        src_port,
        dst_port,
        payload: payload.slice(UDP_HEADER_LEN..length),
    })
}

pub fn decode_tcp(payload: &Bytes) -> Result<TcpDatagram, TransportError> {
    if payload.len() < MIN_TCP_HEADER_LEN {
        return Err(TransportError::TcpTooShort {
            len: payload.len(),
        });
    }
    let src_port = u16::from_be_bytes([payload[0], payload[1]]);
    let dst_port = u16::from_be_bytes([payload[2], payload[3]]);
    let sequence = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let data_offset = (payload[12] >> 4) as usize * 4;
    if data_offset < MIN_TCP_HEADER_LEN {
        return Err(TransportError::InvalidDataOffset(payload[12] >> 4));
    }
    let flags = payload[13];
    if data_offset > payload.len() {
        return Err(TransportError::TcpTooShort {
            len: payload.len(),
        });
    }
    Ok(TcpDatagram {
        src_port,
        dst_port,
        sequence,
        flags,
        payload: payload.slice(data_offset..),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_udp_header_and_payload() {
        let mut buf = vec![0u8; 8 + 4];
        buf[0..2].copy_from_slice(&53u16.to_be_bytes());
        buf[2..4].copy_from_slice(&5353u16.to_be_bytes());
        buf[4..6].copy_from_slice(&12u16.to_be_bytes());
        buf[8..12].copy_from_slice(&[1, 2, 3, 4]);
        let udp = decode_udp(&Bytes::from(buf)).unwrap();
        assert_eq!(udp.src_port, 53);
        assert_eq!(udp.dst_port, 5353);
        assert_eq!(&udp.payload[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn decodes_tcp_header_and_flags() {
        let mut buf = vec![0u8; 20 + 2];
        buf[0..2].copy_from_slice(&53u16.to_be_bytes());
        buf[2..4].copy_from_slice(&40000u16.to_be_bytes());
        buf[4..8].copy_from_slice(&100u32.to_be_bytes());
        buf[12] = 5 << 4;
        buf[13] = TCP_FLAG_SYN | TCP_FLAG_ACK;
        buf[20..22].copy_from_slice(&[9, 9]);
        let tcp = decode_tcp(&Bytes::from(buf)).unwrap();
        assert_eq!(tcp.sequence, 100);
        assert!(tcp.syn());
        assert!(!tcp.fin());
        assert_eq!(&tcp.payload[..], &[9, 9]);
    }
}
