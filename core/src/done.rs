use crossbeam_channel::{Receiver, Sender};

/// Shutdown signal shared across every service thread.
///
/// Modeled as a zero-capacity channel: `DoneTrigger::fire` drops its sender,
/// which makes every clone of [`Done`]'s receiver fail its next `recv()`
/// immediately. Composed into every blocking point via
/// `crossbeam_channel::select!` alongside whatever data channel that thread
/// also reads, so shutdown is observed within one queue turnaround rather
/// than polled.
#[derive(Clone)]
pub struct Done {
    recv: Receiver<()>,
}

impl Done {
    /// True once the trigger has fired (or been dropped).
    pub fn is_done(&self) -> bool {
        matches!(
            self.recv.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    pub fn receiver(&self) -> &Receiver<()> {
        &self.recv
    }
}

/// Owns the sending half of a [`Done`] signal. Call [`DoneTrigger::fire`]
/// (or simply drop it) to broadcast shutdown to every `Done` clone.
pub struct DoneTrigger {
    _send: Sender<()>,
}

impl DoneTrigger {
    pub fn fire(self) {
        // Dropping `_send` closes the channel; every `Done::receiver()`
        // clone then observes a disconnected recv.
    }
}

/// Builds a fresh `Done`/`DoneTrigger` pair for one pipeline run.
pub fn done_channel() -> (DoneTrigger, Done) {
    let (send, recv) = crossbeam_channel::bounded(0);
    (DoneTrigger { _send: send }, Done { recv })
}
