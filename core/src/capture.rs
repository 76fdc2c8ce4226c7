use std::collections::VecDeque;

use crossbeam_channel::Receiver;

use crate::error::CaptureError;
use crate::frame::{Frame, LinkType};

/// Source of captured frames. Deliberately synchronous and blocking rather
/// than async: any driver (pcap, an mmap ring, a pcap-file reader) can
/// implement it without pulling an async runtime into this crate. Writing an
/// actual driver is out of scope here; only the two in-memory
/// implementations below exist, for tests and the demo binary.
pub trait CaptureSource: Send {
    /// Returns the next frame, `Ok(None)` on clean end-of-input (only
    /// meaningful for offline sources), or `Err` on an unrecoverable I/O
    /// failure.
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Link-layer framing every frame from this source uses.
    fn link_type(&self) -> LinkType;

    /// Releases any underlying resource. Best-effort; also runs on `Drop`
    /// for implementations that hold one.
    fn close(&mut self) {}
}

/// Plays back a fixed list of frames, then reports end-of-input. Used to
/// drive deterministic end-to-end tests against a known sequence of frames.
pub struct VecCaptureSource {
    link_type: LinkType,
    frames: VecDeque<Frame>,
}

impl VecCaptureSource {
    pub fn new(link_type: LinkType, frames: Vec<Frame>) -> VecCaptureSource {
        VecCaptureSource {
            link_type,
            frames: frames.into(),
        }
    }
}

impl CaptureSource for VecCaptureSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        Ok(self.frames.pop_front())
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }
}

/// Wraps a `crossbeam_channel::Receiver<Frame>` as a capture source, for
/// tests and demos that want to push frames in from another thread as if
/// they were arriving live. The channel closing is treated as end-of-input.
pub struct ChannelCaptureSource {
    link_type: LinkType,
    recv: Receiver<Frame>,
}

impl ChannelCaptureSource {
    pub fn new(link_type: LinkType, recv: Receiver<Frame>) -> ChannelCaptureSource {
        ChannelCaptureSource { link_type, recv }
    }
}

impl CaptureSource for ChannelCaptureSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.recv.recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(_) => Ok(None),
        }
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }
}
