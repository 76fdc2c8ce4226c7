use crate::defrag::{Ipv4Defragged, Ipv6Defragged};
use crate::frame::Frame;

/// A unit of work on the decoder intake queue: either a fresh frame off the
/// capture source, or a datagram a defragger just completed re-entering the
/// pipeline per §4.1 step 5 ("reassembled datagrams re-enter step 4 with
/// `is_reassembled = true`"). Carrying both on one queue keeps intake fair
/// between new frames and reassembled work, per §4.1's "Why a worker pool".
pub enum DecoderJob {
    Raw(Frame),
    ReassembledV4(Ipv4Defragged),
    ReassembledV6(Ipv6Defragged),
}
