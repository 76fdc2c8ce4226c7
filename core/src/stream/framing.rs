use bytes::{Buf, Bytes, BytesMut};

use crate::decode::decode_dns_message;
use crate::error::DnsDecodeError;
use hickory_proto::op::Message;

/// Per-flow DNS-over-TCP framer: a 2-byte big-endian length prefix followed
/// by the DNS message (RFC 7766). Holds whatever prefix of the stream has
/// arrived but not yet yielded a complete message.
#[derive(Debug, Default)]
pub struct PendingFramer {
    buffer: BytesMut,
}

impl PendingFramer {
    pub fn new() -> PendingFramer {
        PendingFramer::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pulls as many complete `(message, message_len)` pairs out of the
    /// buffered prefix as are available. A decode failure is reported via
    /// `Err` and the caller must destroy the flow's framer state — framing
    /// corruption, per §4.4, kills the flow rather than resyncing.
    pub fn drain_messages(&mut self) -> Result<Vec<(Message, usize)>, DnsDecodeError> {
        let mut out = Vec::new();
        loop {
            if self.buffer.len() < 2 {
                break;
            }
            let len = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
            if self.buffer.len() < 2 + len {
                break;
            }
            self.buffer.advance(2);
            let message_bytes: Bytes = self.buffer.split_to(len).freeze();
            let message = decode_dns_message(&message_bytes)?;
            out.push((message, len));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dns_query_bytes() -> Vec<u8> {
        use hickory_proto::op::{Message, Query};
        use hickory_proto::rr::Name;
        use hickory_proto::serialize::binary::BinEncodable;
        let mut msg = Message::new();
        msg.add_query(Query::query(
            Name::from_ascii("example.com.").unwrap(),
            hickory_proto::rr::RecordType::A,
        ));
        msg.to_bytes().unwrap()
    }

    #[test]
    fn yields_nothing_until_length_prefix_is_satisfied() {
        let body = dns_query_bytes();
        let mut framer = PendingFramer::new();
        framer.push(&(body.len() as u16).to_be_bytes());
        assert!(framer.drain_messages().unwrap().is_empty());
        framer.push(&body[..body.len() - 1]);
        assert!(framer.drain_messages().unwrap().is_empty());
        framer.push(&body[body.len() - 1..]);
        let msgs = framer.drain_messages().unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn pipelined_messages_drain_in_order() {
        let body = dns_query_bytes();
        let mut framer = PendingFramer::new();
        for _ in 0..3 {
            framer.push(&(body.len() as u16).to_be_bytes());
            framer.push(&body);
        }
        let msgs = framer.drain_messages().unwrap();
        assert_eq!(msgs.len(), 3);
    }
}
