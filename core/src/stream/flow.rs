use std::net::IpAddr;
use std::time::SystemTime;

use bytes::Bytes;

/// Directional TCP flow identity: `spec.md` §3 defines `flow_key` this way,
/// and the per-flow state machine in §4.4 is explicitly per-direction, so
/// the forward and reverse halves of one connection are tracked (and
/// sharded) independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
}

impl FlowKey {
    pub fn new(src_ip: IpAddr, src_port: u16, dst_ip: IpAddr, dst_port: u16) -> FlowKey {
        FlowKey {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
        }
    }

    /// True if either endpoint's port matches the configured DNS port, per
    /// §4.4's port policy ("only flows where one endpoint port matches
    /// configured Port are tracked").
    pub fn matches_dns_port(&self, dns_port: u16) -> bool {
        self.src_port == dns_port || self.dst_port == dns_port
    }
}

#[derive(Debug, Clone)]
pub struct TcpSegment {
    pub flow_key: FlowKey,
    pub sequence: u32,
    pub payload: Bytes,
    pub syn: bool,
    pub fin: bool,
    pub rst: bool,
    pub timestamp: Option<SystemTime>,
}

/// Ordered contiguous prefix bytes the assembler has newly made available
/// for a flow. Internal to the assembler/framer boundary; never leaves the
/// stream module.
#[derive(Debug, Clone)]
pub struct TcpStreamBytes {
    pub flow_key: FlowKey,
    pub bytes: Bytes,
    pub timestamp: Option<SystemTime>,
}
