//! Passive DNS traffic observer core: link-layer frame in, decoded
//! [`DNSResult`] out, by way of IPv4/IPv6 reassembly and TCP stream
//! assembly. Capture-source drivers, BPF compilation, signal/CLI handling,
//! configuration loading, and downstream sinks are all external
//! collaborators this crate never touches directly — see
//! [`capture::CaptureSource`] and [`result::ResultSink`] for the boundary.

pub mod capture;
pub mod config;
pub mod decode;
pub mod defrag;
pub mod done;
pub mod error;
pub mod frame;
pub mod orchestrator;
mod processor;
pub mod result;
pub mod stats;
pub mod stream;

pub use capture::{CaptureSource, ChannelCaptureSource, VecCaptureSource};
pub use config::{Config, FragmentPolicy};
pub use done::{done_channel, Done, DoneTrigger};
pub use error::{
    CaptureError, ConfigError, DecodeError, DnsDecodeError, EthernetError, Ipv4Error, Ipv6Error,
    ReassembleError, TransportError,
};
pub use frame::{Frame, LinkType};
pub use orchestrator::Orchestrator;
pub use result::{DNSResult, ResultSink, Transport, VecResultSink};
pub use stats::{Stats, StatsSnapshot};
