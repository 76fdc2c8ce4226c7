use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use super::decoder::{process_job, DecoderContext};
use super::job::DecoderJob;
use crate::done::Done;

/// A pool of plain OS threads sharing one cloned `crossbeam_channel`
/// receiver — true MPMC, so no dispatcher is needed to hand work to a
/// particular worker (unlike a round-robin scheme, which would need one).
/// Intake is fair by construction: whichever idle worker reaches the front
/// of the queue takes the next job, satisfying §4.1's "work-stealing is not
/// required — intake is fair".
pub struct DecoderPool {
    handles: Vec<JoinHandle<()>>,
}

impl DecoderPool {
    pub fn spawn(
        worker_count: usize,
        intake: Receiver<DecoderJob>,
        done: Done,
        ctx: Arc<DecoderContext>,
    ) -> DecoderPool {
        let handles = (0..worker_count.max(1))
            .map(|_| {
                let intake = intake.clone();
                let done = done.clone();
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || worker_loop(intake, done, ctx))
            })
            .collect();
        DecoderPool { handles }
    }

    /// Blocks until every worker thread has exited (after `Done` fires and
    /// the intake queue drains).
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(intake: Receiver<DecoderJob>, done: Done, ctx: Arc<DecoderContext>) {
    loop {
        crossbeam_channel::select! {
            recv(intake) -> job => match job {
                Ok(job) => process_job(job, &ctx),
                Err(_) => return,
            },
            recv(done.receiver()) -> _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::done::done_channel;
    use crate::frame::{Frame, LinkType};
    use crate::stats::Stats;
    use bytes::Bytes;

    #[test]
    fn pool_processes_jobs_and_exits_on_done() {
        let config = Config::default();
        let (intake_tx, intake_rx) = crossbeam_channel::unbounded();
        let (ipv4_tx, _ipv4_rx) = crossbeam_channel::unbounded();
        let (ipv6_tx, _ipv6_rx) = crossbeam_channel::unbounded();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let ctx = Arc::new(DecoderContext {
            dns_port: config.dns_port,
            ipv4_frag_tx: ipv4_tx,
            ipv6_frag_tx: ipv6_tx,
            tcp_tx: Vec::new(),
            result_tx,
            stats: Stats::new(),
        });
        let (trigger, done) = done_channel();
        let pool = DecoderPool::spawn(2, intake_rx, done, ctx);

        // A too-short frame: not a valid DNS job, but enough to prove the
        // worker loop runs and reports back via Stats rather than panicking.
        let frame = Frame::new(LinkType::Ethernet, Bytes::from_static(&[0u8; 4]));
        intake_tx.send(DecoderJob::Raw(frame)).unwrap();

        trigger.fire();
        pool.join();
        assert!(result_rx.try_recv().is_err());
    }
}
