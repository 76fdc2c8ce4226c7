use bytes::Bytes;

/// Link-layer framing a [`crate::capture::CaptureSource`] can report, per
/// the wire formats named in the external interfaces contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// DIX/802.3 Ethernet II, 14-byte header.
    Ethernet,
    /// Linux "cooked capture" (SLL), 16-byte header. Used for `any`-device
    /// captures where no single link type applies.
    LinuxCooked,
}

/// A single captured frame as handed to the pipeline by a `CaptureSource`.
/// `data` is the entire on-wire frame including its link-layer header.
#[derive(Debug, Clone)]
pub struct Frame {
    pub link_type: LinkType,
    pub data: Bytes,
    /// Capture timestamp, if the source provides one.
    pub timestamp: Option<std::time::SystemTime>,
}

impl Frame {
    pub fn new(link_type: LinkType, data: impl Into<Bytes>) -> Frame {
        Frame {
            link_type,
            data: data.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: std::time::SystemTime) -> Frame {
        self.timestamp = Some(timestamp);
        self
    }
}
