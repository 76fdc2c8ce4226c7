use std::collections::BTreeMap;
use std::time::{Instant, SystemTime};

use bytes::Bytes;
use fxhash::FxHashMap;
use log::{debug, warn};

use super::flow::{FlowKey, TcpSegment, TcpStreamBytes};
use super::framing::PendingFramer;
use crate::config::Config;
use crate::error::ReassembleError;
use crate::result::{DNSResult, Transport};
use crate::stats::Stats;

/// Per-directional-flow lifecycle, exactly the four states §4.4 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Unseen,
    Active,
    Closing,
    Dead,
}

struct Flow {
    state: FlowState,
    next_seq: u32,
    buffered: BTreeMap<u32, Bytes>,
    framer: PendingFramer,
    last_activity: Instant,
    timestamp: Option<SystemTime>,
}

impl Flow {
    fn new(initial_seq: u32, now: Instant) -> Flow {
        Flow {
            state: FlowState::Active,
            next_seq: initial_seq,
            buffered: BTreeMap::new(),
            framer: PendingFramer::new(),
            last_activity: now,
            timestamp: None,
        }
    }
}

/// One TCP assembler shard: owns a plain `FxHashMap` of directional flows
/// with no external locking, per the concurrency model's "reassembly tables
/// are owned exclusively by their service task" invariant. Emits
/// `DNSResult`s directly as complete DNS/TCP messages are framed out of
/// each flow's reassembled byte stream.
pub struct TcpAssembler {
    flows: FxHashMap<FlowKey, Flow>,
    dns_port: u16,
    max_gap: u32,
    max_flows: usize,
    timeout: std::time::Duration,
}

impl TcpAssembler {
    pub fn new(config: &Config) -> TcpAssembler {
        TcpAssembler {
            flows: FxHashMap::default(),
            dns_port: config.dns_port,
            max_gap: config.max_tcp_gap,
            max_flows: config.max_flows_per_shard,
            timeout: config.tcp_flow_timeout,
        }
    }

    pub fn process_segment(
        &mut self,
        segment: TcpSegment,
        now: Instant,
        stats: &Stats,
    ) -> Vec<DNSResult> {
        if !segment.flow_key.matches_dns_port(self.dns_port) {
            return Vec::new();
        }

        if !self.flows.contains_key(&segment.flow_key) && self.flows.len() >= self.max_flows {
            stats.frames_dropped_unparseable();
            return Vec::new();
        }

        let flow = self
            .flows
            .entry(segment.flow_key)
            .or_insert_with(|| Flow::new(segment.sequence, now));

        if segment.syn && flow.state == FlowState::Dead {
            *flow = Flow::new(segment.sequence, now);
        }
        flow.last_activity = now;
        if flow.timestamp.is_none() {
            flow.timestamp = segment.timestamp;
        }

        if flow.state == FlowState::Dead {
            return Vec::new();
        }

        if segment.rst {
            debug!("tcp flow {:?} reset", segment.flow_key);
            flow.state = FlowState::Dead;
            flow.buffered.clear();
            stats.tcp_flows_reset();
            return Vec::new();
        }

        if !segment.payload.is_empty() {
            insert_segment_last_wins(&mut flow.buffered, segment.sequence, segment.payload);
        }

        if let Err(ReassembleError::GapTooLarge(gap)) =
            flush_contiguous(flow, self.max_gap, segment.flow_key)
        {
            warn!(
                "tcp flow {:?} gap of {gap} bytes exceeds max_gap, dropping",
                segment.flow_key
            );
            flow.state = FlowState::Dead;
            flow.buffered.clear();
            return Vec::new();
        }

        if segment.fin {
            flow.state = FlowState::Closing;
        }

        // A `Closing` flow with nothing buffered has no outstanding gap
        // before `next_seq`: the FIN (and everything preceding it) arrived
        // in order, so the stream is destroyed now rather than lingering
        // until the GC sweep evicts it.
        if flow.state == FlowState::Closing && flow.buffered.is_empty() {
            flow.state = FlowState::Dead;
        }

        let mut results = Vec::new();
        match flow.framer.drain_messages() {
            Ok(messages) => {
                for (message, len) in messages {
                    stats.dns_results_emitted();
                    results.push(DNSResult {
                        timestamp: flow.timestamp,
                        dns_message: message,
                        ip_version: if segment.flow_key.src_ip.is_ipv4() { 4 } else { 6 },
                        src_ip: segment.flow_key.src_ip,
                        dst_ip: segment.flow_key.dst_ip,
                        src_port: segment.flow_key.src_port,
                        dst_port: segment.flow_key.dst_port,
                        protocol: Transport::Tcp,
                        packet_length: len,
                    });
                }
            }
            Err(decode_err) => {
                warn!(
                    "tcp flow {:?} dns framing corrupt, killing flow: {decode_err}",
                    segment.flow_key
                );
                stats.decode_errors();
                flow.state = FlowState::Dead;
                flow.buffered.clear();
            }
        }

        results
    }

    pub fn gc_sweep(&mut self, now: Instant, stats: &Stats) {
        let timeout = self.timeout;
        let before = self.flows.len();
        self.flows
            .retain(|_, flow| now.duration_since(flow.last_activity) < timeout);
        let evicted = before - self.flows.len();
        for _ in 0..evicted {
            stats.tcp_flows_gc_evicted();
        }
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn flow_state(&self, key: &FlowKey) -> Option<FlowState> {
        self.flows.get(key).map(|f| f.state)
    }
}

/// "Later bytes win" on overlap, matching the base fragment/segment overlap
/// behavior `spec.md` prescribes: a new segment's bytes overwrite whatever
/// previously-buffered bytes they overlap.
fn insert_segment_last_wins(buffered: &mut BTreeMap<u32, Bytes>, seq: u32, payload: Bytes) {
    buffered.insert(seq, payload);
}

/// Walks `flow.buffered` from `flow.next_seq`, appending every contiguous
/// segment to the framer and advancing `next_seq`. Stops at the first gap;
/// a gap wider than `max_gap` is reported as unrecoverable.
fn flush_contiguous(
    flow: &mut Flow,
    max_gap: u32,
    flow_key: FlowKey,
) -> Result<(), ReassembleError> {
    loop {
        let Some((&seq, _)) = flow.buffered.iter().next() else {
            break;
        };
        if seq < flow.next_seq {
            // Fully- or partially-overlapping retransmission of already
            // consumed bytes; drop the stale entry and keep scanning.
            flow.buffered.remove(&seq);
            continue;
        }
        if seq > flow.next_seq {
            let gap = seq - flow.next_seq;
            if gap > max_gap {
                return Err(ReassembleError::GapTooLarge(gap));
            }
            break;
        }
        let payload = flow.buffered.remove(&seq).unwrap();
        let chunk = TcpStreamBytes {
            flow_key,
            bytes: payload,
            timestamp: flow.timestamp,
        };
        flow.next_seq = flow.next_seq.wrapping_add(chunk.bytes.len() as u32);
        flow.framer.push(&chunk.bytes);
    }
    Ok(())
}
