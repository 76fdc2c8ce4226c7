use thiserror::Error;

/// Errors a [`crate::capture::CaptureSource`] can report while producing frames.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture source I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture source closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum EthernetError {
    #[error("frame too short for an Ethernet header ({len} bytes)")]
    TooShort { len: usize },
    #[error("frame too short for a Linux cooked-capture header ({len} bytes)")]
    TooShortCooked { len: usize },
    #[error("unsupported ethertype {0:#06x}")]
    UnsupportedEthertype(u16),
}

#[derive(Debug, Error)]
pub enum Ipv4Error {
    #[error("buffer too short for an IPv4 header ({len} bytes)")]
    TooShort { len: usize },
    #[error("unsupported IP version {0} in IPv4 path")]
    WrongVersion(u8),
    #[error("IHL {0} smaller than minimum header size")]
    InvalidIhl(u8),
    #[error("header declares length {declared} but buffer has {available}")]
    TruncatedPayload { declared: usize, available: usize },
}

#[derive(Debug, Error)]
pub enum Ipv6Error {
    #[error("buffer too short for an IPv6 header ({len} bytes)")]
    TooShort { len: usize },
    #[error("unsupported IP version {0} in IPv6 path")]
    WrongVersion(u8),
    #[error("payload length {declared} exceeds available {available} bytes")]
    TruncatedPayload { declared: usize, available: usize },
    #[error("extension header chain exceeds {0} hops without reaching a terminal header")]
    ExtensionChainTooLong(usize),
    #[error("buffer too short for extension header of type {0}")]
    TruncatedExtensionHeader(u8),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("buffer too short for a UDP header ({len} bytes)")]
    UdpTooShort { len: usize },
    #[error("buffer too short for a TCP header ({len} bytes)")]
    TcpTooShort { len: usize },
    #[error("TCP data offset {0} smaller than minimum header size")]
    InvalidDataOffset(u8),
    #[error("UDP length {declared} exceeds available {available} bytes")]
    UdpTruncated { declared: usize, available: usize },
}

#[derive(Debug, Error)]
pub enum DnsDecodeError {
    #[error("message too short to contain a DNS header")]
    TooShort,
    #[error("hickory-proto failed to parse the message: {0}")]
    Proto(#[from] hickory_proto::error::ProtoError),
}

/// Top-level decode failure, covering every layer from link type down to the
/// DNS message itself. Never surfaced in a [`crate::result::DNSResult`] — a
/// `DecodeError` means the frame/datagram is silently dropped after being
/// logged and counted in [`crate::stats::Stats`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a DNS transport: {0}")]
    NotDnsTransport(&'static str),
    #[error(transparent)]
    Ethernet(#[from] EthernetError),
    #[error(transparent)]
    Ipv4(#[from] Ipv4Error),
    #[error(transparent)]
    Ipv6(#[from] Ipv6Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dns(#[from] DnsDecodeError),
}

/// Errors raised while folding a fragment or segment into a reassembly table.
#[derive(Debug, Error)]
pub enum ReassembleError {
    #[error("fragment offset {offset} + length {len} overflows u16 total length")]
    FragmentOverflow { offset: u32, len: u32 },
    #[error("conflicting overlap at byte {0}, dropped under DropOnConflict policy")]
    ConflictingOverlap(u32),
    #[error("sequence gap of {0} bytes exceeds configured max_gap")]
    GapTooLarge(u32),
}

/// Raised by [`crate::config::Config::validate`]; fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("exactly one of device_name or capture_file_path must be set")]
    AmbiguousCaptureSource,
    #[error("dns_port must be nonzero")]
    ZeroDnsPort,
    #[error("{field} must be nonzero")]
    ZeroField { field: &'static str },
}
