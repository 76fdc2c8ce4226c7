use hickory_proto::op::Message;
use hickory_proto::serialize::binary::BinDecodable;

use crate::error::DnsDecodeError;

/// Decodes a complete DNS message, owning the result — never a borrow into
/// the frame or stream buffer it came from.
pub fn decode_dns_message(bytes: &[u8]) -> Result<Message, DnsDecodeError> {
    if bytes.len() < 12 {
        return Err(DnsDecodeError::TooShort);
    }
    Message::from_bytes(bytes).map_err(DnsDecodeError::from)
}
