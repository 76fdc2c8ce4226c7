use std::net::IpAddr;
use std::time::SystemTime;

use hickory_proto::op::Message;

/// Transport a DNS message arrived over. Serializes as the lowercase
/// strings `spec.md` uses for `DNSResult.protocol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
}

/// A single decoded DNS message, fully reassembled and owned — never a
/// borrow into a capture buffer or a reassembly table's storage. Field
/// semantics match `spec.md` §3 exactly: `packet_length` is the length of
/// the DNS message bytes, not the enclosing frame.
#[derive(Debug, Clone)]
pub struct DNSResult {
    pub timestamp: Option<SystemTime>,
    pub dns_message: Message,
    pub ip_version: u8,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Transport,
    pub packet_length: usize,
}

/// Downstream consumer of decoded DNS messages. Implementations are an
/// external collaborator — this crate only ever produces `DNSResult`s and
/// hands them to a `ResultSink`; it never writes to a socket, file, or queue
/// itself.
pub trait ResultSink: Send {
    fn accept(&mut self, result: DNSResult);
}

/// Collects every `DNSResult` it receives, in order. Used by tests and the
/// demo binary; not a production sink.
#[derive(Default)]
pub struct VecResultSink {
    pub results: Vec<DNSResult>,
}

impl ResultSink for VecResultSink {
    fn accept(&mut self, result: DNSResult) {
        self.results.push(result);
    }
}

impl<F: FnMut(DNSResult) + Send> ResultSink for F {
    fn accept(&mut self, result: DNSResult) {
        self(result)
    }
}
