use std::net::Ipv4Addr;
use std::time::{Instant, SystemTime};

use bytes::{Bytes, BytesMut};
use fxhash::FxHashMap;
use log::warn;

use super::policy::{FragmentPolicy, OverlapOutcome};
use super::ranges::IntervalSet;
use crate::config::Config;
use crate::error::ReassembleError;
use crate::stats::Stats;

/// Maximum total IPv4 datagram length (RFC 791): fragments that would
/// reassemble past this are dropped rather than tracked.
const MAX_IPV4_DATAGRAM_LEN: u32 = 65_535;

#[derive(Debug, Clone)]
pub struct Ipv4Fragment {
    pub identifier: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub fragment_offset: u16,
    pub more_fragments: bool,
    pub payload: Bytes,
    pub timestamp: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct Ipv4Defragged {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub payload: Bytes,
    pub timestamp: Option<SystemTime>,
}

type Key = (Ipv4Addr, Ipv4Addr, u8, u16);

struct GroupEntry {
    buffer: BytesMut,
    coverage: IntervalSet,
    total_length: Option<u32>,
    last_activity: Instant,
    timestamp: Option<SystemTime>,
}

impl GroupEntry {
    fn new(now: Instant) -> GroupEntry {
        GroupEntry {
            buffer: BytesMut::new(),
            coverage: IntervalSet::new(),
            total_length: None,
            last_activity: now,
            timestamp: None,
        }
    }

    fn ensure_capacity(&mut self, len: u32) {
        if (self.buffer.len() as u32) < len {
            self.buffer.resize(len as usize, 0);
        }
    }
}

/// Reassembles IPv4 fragments into complete datagrams, per §4.2. Owned
/// exclusively by one service task — no external locking, matching the
/// concurrency model's table-ownership invariant.
pub struct Ipv4Defragger {
    table: FxHashMap<Key, GroupEntry>,
    policy: FragmentPolicy,
    max_groups: usize,
    timeout: std::time::Duration,
}

impl Ipv4Defragger {
    pub fn new(config: &Config) -> Ipv4Defragger {
        Ipv4Defragger {
            table: FxHashMap::default(),
            policy: config.fragment_policy,
            max_groups: config.max_fragment_groups,
            timeout: config.fragment_timeout,
        }
    }

    pub fn process_fragment(
        &mut self,
        frag: Ipv4Fragment,
        now: Instant,
        stats: &Stats,
    ) -> Option<Ipv4Defragged> {
        let start = frag.fragment_offset as u32;
        let end = start + frag.payload.len() as u32;
        if end > MAX_IPV4_DATAGRAM_LEN {
            let err = ReassembleError::FragmentOverflow {
                offset: frag.fragment_offset as u32,
                len: frag.payload.len() as u32,
            };
            warn!("dropping ipv4 fragment: {err}");
            stats.frames_dropped_unparseable();
            return None;
        }

        let key = (frag.src, frag.dst, frag.protocol, frag.identifier);

        if !self.table.contains_key(&key) && self.table.len() >= self.max_groups {
            stats.frames_dropped_unparseable();
            return None;
        }

        let entry = self.table.entry(key).or_insert_with(|| GroupEntry::new(now));
        entry.last_activity = now;
        if entry.timestamp.is_none() {
            entry.timestamp = frag.timestamp;
        }
        if !frag.more_fragments {
            entry.total_length = Some(end);
        }
        entry.ensure_capacity(end);

        let overlapped = entry.coverage.insert(start, end);
        let (outcome, write_new) = self.policy.resolve_overlap(overlapped);
        match outcome {
            OverlapOutcome::MustDrop => {
                let err = ReassembleError::ConflictingOverlap(start);
                warn!("dropping ipv4 fragment group {key:?}: {err}");
                self.table.remove(&key);
                return None;
            }
            OverlapOutcome::NoConflict | OverlapOutcome::Resolved => {
                if write_new {
                    entry.buffer[start as usize..end as usize].copy_from_slice(&frag.payload);
                }
            }
        }

        let total_length = entry.total_length?;
        if entry.coverage.covers(total_length) {
            let entry = self.table.remove(&key).unwrap();
            return Some(Ipv4Defragged {
                src: key.0,
                dst: key.1,
                protocol: key.2,
                payload: entry.buffer.freeze(),
                timestamp: entry.timestamp,
            });
        }
        None
    }

    /// Sweeps the table evicting groups idle longer than the configured
    /// fragment timeout. Called on a periodic tick by the orchestrator.
    pub fn gc_sweep(&mut self, now: Instant, stats: &Stats) {
        let timeout = self.timeout;
        let before = self.table.len();
        self.table
            .retain(|_, entry| now.duration_since(entry.last_activity) < timeout);
        let evicted = before - self.table.len();
        for _ in 0..evicted {
            stats.fragments_gc_evicted();
        }
    }

    pub fn group_count(&self) -> usize {
        self.table.len()
    }
}
