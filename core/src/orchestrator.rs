use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};

use crate::capture::CaptureSource;
use crate::config::Config;
use crate::defrag::{Ipv4Defragger, Ipv4Fragment, Ipv6Defragger, Ipv6Fragment};
use crate::done::Done;
use crate::error::{CaptureError, ConfigError};
use crate::processor::{DecoderContext, DecoderJob, DecoderPool};
use crate::result::{DNSResult, ResultSink};
use crate::stats::Stats;
use crate::stream::{TcpAssembler, TcpSegment};

/// Assembles the pipeline described in spec.md §4.5: wires every channel,
/// spawns every service thread, pumps a [`CaptureSource`] into the decoder
/// intake, and tears the whole thing down on a [`Done`] signal.
///
/// `result_sink`, `bpf_filter`, `use_mmap_ring` and `done_signal` from the
/// spec's enumerated configuration are deliberately not fields of
/// [`Config`]: a `ResultSink` and a `Done` are supplied to [`Orchestrator::run`]
/// directly (they are run-scoped collaborators, not serializable settings),
/// and BPF filter compilation/mmap ring selection are the capture source's
/// own concern (§1) — the core never sees a filter string.
pub struct Orchestrator {
    config: Config,
    stats: Arc<Stats>,
}

impl Orchestrator {
    /// Validates `config` (fatal at startup per §7 on failure) and returns
    /// an `Orchestrator` ready to [`run`](Orchestrator::run).
    pub fn new(config: Config) -> Result<Orchestrator, ConfigError> {
        config.validate()?;
        Ok(Orchestrator {
            config,
            stats: Stats::new(),
        })
    }

    /// Shared counters updated by every worker and service thread spawned by
    /// `run`. Safe to read concurrently with a running pipeline.
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    /// Spawns every service thread, pumps frames from `source` into the
    /// decoder intake until it is exhausted or `done` fires, then waits for
    /// every thread to exit before returning.
    ///
    /// A live `source` returning an I/O error is fatal and propagated; an
    /// offline `source` reaching end-of-stream is graceful and returns
    /// `Ok(())`, matching §7's capture-source-I/O-error disposition. Either
    /// way the pipeline's own internal shutdown signal fires as soon as
    /// `source` stops producing frames, so an exhausted offline source tears
    /// the whole pipeline down exactly as an externally fired `done` would —
    /// `done` only needs to be observed by the pump itself, to let a live
    /// capture be cut short before its source would otherwise stop on its
    /// own.
    pub fn run(
        &self,
        mut source: Box<dyn CaptureSource>,
        sink: impl ResultSink + 'static,
        done: Done,
    ) -> Result<(), CaptureError> {
        info!(
            "starting pipeline: {} decoder workers, {} tcp shards",
            self.config.decoder_worker_count, self.config.tcp_worker_count
        );
        let (internal_trigger, internal_done) = crate::done::done_channel();
        let pipeline = self.spawn_pipeline(internal_done.clone());
        let sink_handle =
            spawn_sink_forwarder(pipeline.result_rx.clone(), sink, internal_done.clone());

        let pump_result = pump(source.as_mut(), &pipeline.decoder_tx, &done);

        // Whether `source` ran out on its own or `done` cut it short, give
        // whatever is already mid-flight (a fragment group one datagram
        // short of complete, a TCP segment one hop from its shard) a
        // bounded chance to flush through before every service thread tears
        // down the same way from here — the "bounded wait for in-flight
        // work to flush" §4.5 calls for.
        wait_for_drain(&pipeline);
        internal_trigger.fire();
        pipeline.join();
        let _ = sink_handle.join();
        info!("pipeline stopped");
        pump_result
    }

    fn spawn_pipeline(&self, done: Done) -> Pipeline {
        let cfg = &self.config;
        let stats = Arc::clone(&self.stats);
        let tcp_worker_count = cfg.tcp_worker_count.max(1);

        let (decoder_tx, decoder_rx) = bounded::<DecoderJob>(cfg.queue_depth);
        let (ipv4_frag_tx, ipv4_frag_rx) = bounded::<Ipv4Fragment>(cfg.queue_depth);
        let (ipv6_frag_tx, ipv6_frag_rx) = bounded::<Ipv6Fragment>(cfg.queue_depth);
        let (result_tx, result_rx) = bounded::<DNSResult>(cfg.queue_depth);

        let mut tcp_senders = Vec::with_capacity(tcp_worker_count);
        let mut tcp_receivers = Vec::with_capacity(tcp_worker_count);
        for _ in 0..tcp_worker_count {
            let (tx, rx) = bounded::<TcpSegment>(cfg.queue_depth);
            tcp_senders.push(tx);
            tcp_receivers.push(rx);
        }

        // Cloning a `Receiver` doesn't consume anything already queued on
        // it; these clones are read only via `.len()` to detect quiescence
        // in `wait_for_drain`; the originals below are the ones actually
        // consumed by the service threads.
        let decoder_rx_probe = decoder_rx.clone();
        let ipv4_frag_rx_probe = ipv4_frag_rx.clone();
        let ipv6_frag_rx_probe = ipv6_frag_rx.clone();
        let tcp_rx_probes: Vec<Receiver<TcpSegment>> =
            tcp_receivers.iter().map(|rx| rx.clone()).collect();

        // Each TCP shard thread sends its own emitted `DNSResult`s directly
        // (§4.4's contract: "Output: `DNSResult` emitted directly"), so it
        // needs its own clone of `result_tx` alongside the one the decoder
        // context uses for UDP results.
        let tcp_result_txs: Vec<Sender<DNSResult>> =
            (0..tcp_worker_count).map(|_| result_tx.clone()).collect();

        let ctx = Arc::new(DecoderContext {
            dns_port: cfg.dns_port,
            ipv4_frag_tx: ipv4_frag_tx.clone(),
            ipv6_frag_tx: ipv6_frag_tx.clone(),
            tcp_tx: tcp_senders,
            result_tx: result_tx.clone(),
            stats: Arc::clone(&stats),
        });
        // The context and the service threads below each hold their own
        // clone of `decoder_tx`/`ipv4_frag_tx`/`ipv6_frag_tx`/`result_tx`;
        // dropping the locals once every thread has its clone lets the
        // channels disconnect (and downstream `recv()`s fail) once every
        // producer has exited, rather than only when `Orchestrator::run`
        // itself drops its copies.
        drop(ipv4_frag_tx);
        drop(ipv6_frag_tx);
        drop(result_tx);

        let decoder_pool =
            DecoderPool::spawn(cfg.decoder_worker_count, decoder_rx, done.clone(), ctx);

        let mut service_handles = Vec::new();
        service_handles.push(spawn_ipv4_defragger(
            cfg,
            ipv4_frag_rx,
            decoder_tx.clone(),
            done.clone(),
            Arc::clone(&stats),
        ));
        service_handles.push(spawn_ipv6_defragger(
            cfg,
            ipv6_frag_rx,
            decoder_tx.clone(),
            done.clone(),
            Arc::clone(&stats),
        ));
        for (seg_rx, result_tx) in tcp_receivers.into_iter().zip(tcp_result_txs) {
            service_handles.push(spawn_tcp_shard(
                cfg,
                seg_rx,
                result_tx,
                done.clone(),
                Arc::clone(&stats),
            ));
        }

        Pipeline {
            decoder_tx,
            result_rx,
            decoder_pool,
            service_handles,
            decoder_rx_probe,
            ipv4_frag_rx_probe,
            ipv6_frag_rx_probe,
            tcp_rx_probes,
        }
    }
}

struct Pipeline {
    decoder_tx: Sender<DecoderJob>,
    result_rx: Receiver<DNSResult>,
    decoder_pool: DecoderPool,
    service_handles: Vec<JoinHandle<()>>,
    decoder_rx_probe: Receiver<DecoderJob>,
    ipv4_frag_rx_probe: Receiver<Ipv4Fragment>,
    ipv6_frag_rx_probe: Receiver<Ipv6Fragment>,
    tcp_rx_probes: Vec<Receiver<TcpSegment>>,
}

impl Pipeline {
    fn join(self) {
        self.decoder_pool.join();
        for handle in self.service_handles {
            let _ = handle.join();
        }
    }

    /// No queue between any two stages currently holds an undelivered item.
    /// Doesn't see work a thread has already dequeued but not finished
    /// processing, which is why `wait_for_drain` samples this repeatedly
    /// rather than trusting a single `true` reading.
    fn is_idle(&self) -> bool {
        self.decoder_rx_probe.is_empty()
            && self.ipv4_frag_rx_probe.is_empty()
            && self.ipv6_frag_rx_probe.is_empty()
            && self.tcp_rx_probes.iter().all(Receiver::is_empty)
            && self.result_rx.is_empty()
    }
}

/// Polls `pipeline` for quiescence for a bounded interval after the pump
/// loop stops feeding it new frames, so that work already mid-flight (a
/// fragment group one datagram short of complete, a segment one hop from
/// its shard) gets a chance to finish before `Done` cuts it off. Three
/// consecutive idle readings are required rather than one, since an empty
/// queue can still have a job in a worker's hand between dequeue and
/// completion.
fn wait_for_drain(pipeline: &Pipeline) {
    let deadline = Instant::now() + Duration::from_millis(500);
    let mut consecutive_idle = 0u8;
    while Instant::now() < deadline {
        if pipeline.is_idle() {
            consecutive_idle += 1;
            if consecutive_idle >= 3 {
                return;
            }
        } else {
            consecutive_idle = 0;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Reads frames from `source` and pushes each onto the decoder intake,
/// respecting `done` at both the read and the send. An offline source's
/// end-of-stream and an externally fired `done` are both a clean `Ok(())`
/// return; a live source's I/O error is propagated per §7.
fn pump(
    source: &mut dyn CaptureSource,
    decoder_tx: &Sender<DecoderJob>,
    done: &Done,
) -> Result<(), CaptureError> {
    loop {
        if done.is_done() {
            return Ok(());
        }
        let frame = match source.read_frame()? {
            Some(frame) => frame,
            None => return Ok(()),
        };
        crossbeam_channel::select! {
            send(decoder_tx, DecoderJob::Raw(frame)) -> res => {
                if res.is_err() {
                    return Ok(());
                }
            }
            recv(done.receiver()) -> _ => return Ok(()),
        }
    }
}

/// Drains `result_rx` into `sink` until every producer has dropped its
/// sender (pipeline fully torn down) or `done` fires, in which case
/// whatever is already queued is flushed before returning — the "bounded
/// wait for in-flight work to flush" §4.5 describes.
fn spawn_sink_forwarder(
    result_rx: Receiver<DNSResult>,
    mut sink: impl ResultSink + 'static,
    done: Done,
) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        crossbeam_channel::select! {
            recv(result_rx) -> msg => match msg {
                Ok(result) => sink.accept(result),
                Err(_) => return,
            },
            recv(done.receiver()) -> _ => {
                while let Ok(result) = result_rx.try_recv() {
                    sink.accept(result);
                }
                return;
            }
        }
    })
}

fn spawn_ipv4_defragger(
    config: &Config,
    frag_rx: Receiver<Ipv4Fragment>,
    decoder_tx: Sender<DecoderJob>,
    done: Done,
    stats: Arc<Stats>,
) -> JoinHandle<()> {
    let mut defragger = Ipv4Defragger::new(config);
    let gc_period = config.gc_interval;
    std::thread::spawn(move || {
        let ticker = crossbeam_channel::tick(gc_period);
        loop {
            crossbeam_channel::select! {
                recv(frag_rx) -> frag => match frag {
                    Ok(frag) => {
                        if let Some(datagram) =
                            defragger.process_fragment(frag, Instant::now(), &stats)
                        {
                            let _ = decoder_tx.send(DecoderJob::ReassembledV4(datagram));
                        }
                    }
                    Err(_) => return,
                },
                recv(ticker) -> _ => {
                    let before = defragger.group_count();
                    defragger.gc_sweep(Instant::now(), &stats);
                    let evicted = before - defragger.group_count();
                    if evicted > 0 {
                        debug!("ipv4 defrag gc evicted {evicted} groups");
                    }
                }
                recv(done.receiver()) -> _ => return,
            }
        }
    })
}

fn spawn_ipv6_defragger(
    config: &Config,
    frag_rx: Receiver<Ipv6Fragment>,
    decoder_tx: Sender<DecoderJob>,
    done: Done,
    stats: Arc<Stats>,
) -> JoinHandle<()> {
    let mut defragger = Ipv6Defragger::new(config);
    let gc_period = config.gc_interval;
    std::thread::spawn(move || {
        let ticker = crossbeam_channel::tick(gc_period);
        loop {
            crossbeam_channel::select! {
                recv(frag_rx) -> frag => match frag {
                    Ok(frag) => {
                        if let Some(datagram) =
                            defragger.process_fragment(frag, Instant::now(), &stats)
                        {
                            let _ = decoder_tx.send(DecoderJob::ReassembledV6(datagram));
                        }
                    }
                    Err(_) => return,
                },
                recv(ticker) -> _ => defragger.gc_sweep(Instant::now(), &stats),
                recv(done.receiver()) -> _ => return,
            }
        }
    })
}

fn spawn_tcp_shard(
    config: &Config,
    seg_rx: Receiver<TcpSegment>,
    result_tx: Sender<DNSResult>,
    done: Done,
    stats: Arc<Stats>,
) -> JoinHandle<()> {
    let mut assembler = TcpAssembler::new(config);
    let gc_period = config.gc_interval;
    std::thread::spawn(move || {
        let ticker = crossbeam_channel::tick(gc_period);
        loop {
            crossbeam_channel::select! {
                recv(seg_rx) -> seg => match seg {
                    Ok(seg) => {
                        for result in assembler.process_segment(seg, Instant::now(), &stats) {
                            let _ = result_tx.send(result);
                        }
                    }
                    Err(_) => return,
                },
                recv(ticker) -> _ => assembler.gc_sweep(Instant::now(), &stats),
                recv(done.receiver()) -> _ => return,
            }
        }
    })
}
