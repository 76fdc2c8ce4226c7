use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How overlapping bytes within a single IPv4/IPv6 fragment group are
/// resolved. `LastWins` is the base behavior `spec.md` describes; the other
/// two make the policy selectable per the fragment-overlap Open Question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentPolicy {
    /// The most recently received fragment's bytes win on overlap.
    LastWins,
    /// The first fragment to claim a byte range keeps it.
    FirstWins,
    /// Any conflicting overlap discards the whole fragment group.
    DropOnConflict,
}

impl Default for FragmentPolicy {
    fn default() -> Self {
        FragmentPolicy::LastWins
    }
}

/// In-memory configuration for a single pipeline instance. Constructing a
/// `Config` never touches a file or the environment; loading one from either
/// is an external collaborator's job, not this crate's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Live capture device name. Mutually exclusive with `capture_file_path`.
    pub device_name: Option<String>,
    /// Offline capture file path. Mutually exclusive with `device_name`.
    pub capture_file_path: Option<String>,
    /// UDP/TCP port DNS traffic is expected on.
    pub dns_port: u16,
    /// Number of decoder worker threads.
    pub decoder_worker_count: usize,
    /// Number of TCP assembler shards.
    pub tcp_worker_count: usize,
    /// Depth of every bounded intake queue in the pipeline.
    pub queue_depth: usize,
    /// How often fragment/flow tables are swept for expired entries. Per
    /// §4.2's "tick at least once per GcTime", this must not exceed a
    /// quarter of the shortest configured timeout (`fragment_timeout`,
    /// almost always the shortest of the two) or stale entries can linger
    /// well past their nominal timeout between sweeps.
    pub gc_interval: Duration,
    /// Fragment group idle timeout before GC eviction.
    pub fragment_timeout: Duration,
    /// TCP flow idle timeout before GC eviction.
    pub tcp_flow_timeout: Duration,
    /// Upper bound on concurrently tracked fragment groups, per defragmenter.
    pub max_fragment_groups: usize,
    /// Upper bound on concurrently tracked TCP flows, per shard.
    pub max_flows_per_shard: usize,
    /// Maximum gap (in bytes) tolerated between the next expected TCP
    /// sequence number and an out-of-order segment before it is rejected.
    pub max_tcp_gap: u32,
    /// Overlap resolution policy for IPv4/IPv6 fragments.
    pub fragment_policy: FragmentPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_name: None,
            capture_file_path: None,
            dns_port: 53,
            decoder_worker_count: num_cpus::get(),
            tcp_worker_count: num_cpus::get(),
            queue_depth: 4096,
            // A quarter of `fragment_timeout` (the shorter of the two
            // timeouts below), so every GC'd table ticks at least four
            // times within its own timeout window.
            gc_interval: Duration::from_millis(2_500),
            fragment_timeout: Duration::from_secs(10),
            tcp_flow_timeout: Duration::from_secs(120),
            max_fragment_groups: 65_536,
            max_flows_per_shard: 65_536,
            max_tcp_gap: 64 * 1024,
            fragment_policy: FragmentPolicy::default(),
        }
    }
}

impl Config {
    /// Checks the invariants the orchestrator relies on before spawning any
    /// service thread. A `Config` built by hand (e.g. in tests) that skips
    /// this call is the caller's responsibility.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_some() == self.capture_file_path.is_some() {
            return Err(ConfigError::AmbiguousCaptureSource);
        }
        if self.dns_port == 0 {
            return Err(ConfigError::ZeroDnsPort);
        }
        if self.decoder_worker_count == 0 {
            return Err(ConfigError::ZeroField {
                field: "decoder_worker_count",
            });
        }
        if self.tcp_worker_count == 0 {
            return Err(ConfigError::ZeroField {
                field: "tcp_worker_count",
            });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroField {
                field: "queue_depth",
            });
        }
        if self.gc_interval.is_zero() {
            return Err(ConfigError::ZeroField {
                field: "gc_interval",
            });
        }
        Ok(())
    }
}
