use std::time::Instant;

use fxhash::FxHasher;
use std::hash::{Hash, Hasher};

use super::flow::{FlowKey, TcpSegment};
use super::tcp::TcpAssembler;
use crate::config::Config;
use crate::result::DNSResult;
use crate::stats::Stats;

/// Owns `tcp_worker_count` independent [`TcpAssembler`] shards. Each flow is
/// routed to exactly one shard for its whole lifetime by a stable hash of
/// its directional key, preventing cross-flow head-of-line blocking and
/// letting every shard own its table without locking (§4.4 "Why sharding").
pub struct ShardedTcpAssembler {
    shards: Vec<TcpAssembler>,
}

impl ShardedTcpAssembler {
    pub fn new(config: &Config) -> ShardedTcpAssembler {
        let shards = (0..config.tcp_worker_count.max(1))
            .map(|_| TcpAssembler::new(config))
            .collect();
        ShardedTcpAssembler { shards }
    }

    pub fn shard_index(&self, key: &FlowKey) -> usize {
        shard_for(key, self.shards.len())
    }

    pub fn process_segment(
        &mut self,
        segment: TcpSegment,
        now: Instant,
        stats: &Stats,
    ) -> Vec<DNSResult> {
        let idx = self.shard_index(&segment.flow_key);
        self.shards[idx].process_segment(segment, now, stats)
    }

    pub fn gc_sweep(&mut self, now: Instant, stats: &Stats) {
        for shard in &mut self.shards {
            shard.gc_sweep(now, stats);
        }
    }

    pub fn total_flow_count(&self) -> usize {
        self.shards.iter().map(|s| s.flow_count()).sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

/// Exposed so decoder workers (which do not own a `ShardedTcpAssembler`
/// themselves, only a `Sender` per shard) can route a segment to the same
/// shard index the assembler side would compute.
pub fn shard_index_for(key: &FlowKey, shard_count: usize) -> usize {
    shard_for(key, shard_count)
}

fn shard_for(key: &FlowKey, shard_count: usize) -> usize {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % shard_count as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn same_key_always_maps_to_the_same_shard() {
        let key = FlowKey::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            1234,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            53,
        );
        let a = shard_for(&key, 8);
        let b = shard_for(&key, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn distributes_many_flows_across_all_shards() {
        use std::collections::HashSet;
        let mut hit = HashSet::new();
        for port in 1024u16..2048 {
            let key = FlowKey::new(
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                port,
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                53,
            );
            hit.insert(shard_for(&key, 8));
        }
        assert_eq!(hit.len(), 8);
    }
}
