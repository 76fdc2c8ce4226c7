use std::net::Ipv4Addr;
use std::time::Instant;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dnscap_core::config::Config;
use dnscap_core::defrag::{Ipv4Defragger, Ipv4Fragment};
use dnscap_core::Stats;

const FRAGMENT_PAYLOAD_LEN: usize = 1200;
const FRAGMENTS_PER_DATAGRAM: usize = 4;

fn fragments_for(identifier: u16) -> Vec<Ipv4Fragment> {
    (0..FRAGMENTS_PER_DATAGRAM)
        .map(|i| Ipv4Fragment {
            identifier,
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
            protocol: 17,
            fragment_offset: (i * FRAGMENT_PAYLOAD_LEN) as u16,
            more_fragments: i + 1 < FRAGMENTS_PER_DATAGRAM,
            payload: Bytes::from(vec![0xab; FRAGMENT_PAYLOAD_LEN]),
            timestamp: None,
        })
        .collect()
}

fn bench_single_group_completion(c: &mut Criterion) {
    let config = Config::default();
    let stats = Stats::new();

    c.bench_function("ipv4_defrag_complete_group_in_order", |b| {
        b.iter(|| {
            let mut defragger = Ipv4Defragger::new(&config);
            let now = Instant::now();
            let mut last = None;
            for frag in fragments_for(1) {
                last = defragger.process_fragment(black_box(frag), now, &stats);
            }
            black_box(last)
        });
    });
}

fn bench_many_concurrent_groups(c: &mut Criterion) {
    let config = Config::default();
    let stats = Stats::new();

    c.bench_function("ipv4_defrag_1000_interleaved_groups", |b| {
        b.iter(|| {
            let mut defragger = Ipv4Defragger::new(&config);
            let now = Instant::now();
            let groups: Vec<Vec<Ipv4Fragment>> =
                (0..1000u16).map(fragments_for).collect();
            // Interleave fragment index across all groups, worst case for a
            // hash table that must keep every group's partial state live at
            // once rather than completing them one at a time.
            for i in 0..FRAGMENTS_PER_DATAGRAM {
                for group in &groups {
                    black_box(defragger.process_fragment(group[i].clone(), now, &stats));
                }
            }
        });
    });
}

criterion_group!(benches, bench_single_group_completion, bench_many_concurrent_groups);
criterion_main!(benches);
