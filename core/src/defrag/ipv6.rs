use std::net::Ipv6Addr;
use std::time::{Instant, SystemTime};

use bytes::{Bytes, BytesMut};
use fxhash::FxHashMap;
use log::warn;

use super::policy::{FragmentPolicy, OverlapOutcome};
use super::ranges::IntervalSet;
use crate::config::Config;
use crate::error::ReassembleError;
use crate::stats::Stats;

#[derive(Debug, Clone)]
pub struct Ipv6Fragment {
    pub identifier: u32,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub next_header: u8,
    pub fragment_offset: u16,
    pub more_fragments: bool,
    pub payload: Bytes,
    pub timestamp: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct Ipv6Defragged {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub next_header: u8,
    pub payload: Bytes,
    pub timestamp: Option<SystemTime>,
}

type Key = (Ipv6Addr, Ipv6Addr, u32);

struct GroupEntry {
    buffer: BytesMut,
    coverage: IntervalSet,
    total_length: Option<u32>,
    next_header: Option<u8>,
    last_activity: Instant,
    timestamp: Option<SystemTime>,
}

impl GroupEntry {
    fn new(now: Instant) -> GroupEntry {
        GroupEntry {
            buffer: BytesMut::new(),
            coverage: IntervalSet::new(),
            total_length: None,
            next_header: None,
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

/// Analogous to [`crate::defrag::ipv4::Ipv4Defragger`] (§4.3): keyed by
/// `(src, dst, identifier)` since IPv6's fragment identifier is already
/// 32-bit and needs no protocol discriminator in the key.
pub struct Ipv6Defragger {
    table: FxHashMap<Key, GroupEntry>,
    policy: FragmentPolicy,
    max_groups: usize,
    timeout: std::time::Duration,
}

impl Ipv6Defragger {
    pub fn new(config: &Config) -> Ipv6Defragger {
        Ipv6Defragger {
            table: FxHashMap::default(),
            policy: config.fragment_policy,
            max_groups: config.max_fragment_groups,
            timeout: config.fragment_timeout,
        }
    }

    pub fn process_fragment(
        &mut self,
        frag: Ipv6Fragment,
        now: Instant,
        stats: &Stats,
    ) -> Option<Ipv6Defragged> {
        let start = frag.fragment_offset as u32;
        let end = start + frag.payload.len() as u32;

        let key = (frag.src, frag.dst, frag.identifier);

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
            entry.next_header = Some(frag.next_header);
        }
        entry.ensure_capacity(end);

        let overlapped = entry.coverage.insert(start, end);
        let (outcome, write_new) = self.policy.resolve_overlap(overlapped);
        match outcome {
            OverlapOutcome::MustDrop => {
                let err = ReassembleError::ConflictingOverlap(start);
                warn!("dropping ipv6 fragment group {key:?}: {err}");
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
            let next_header = entry.next_header?;
            let entry = self.table.remove(&key).unwrap();
            return Some(Ipv6Defragged {
                src: key.0,
                dst: key.1,
                next_header,
                payload: entry.buffer.freeze(),
                timestamp: entry.timestamp,
            });
        }
        None
    }

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
