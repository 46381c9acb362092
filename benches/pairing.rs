//! Benchmark for the pairing resolver and extent filtering
//!
//! Target: a full 1000-source run well under a second

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use replica_pairing::inventory::ExtentMap;
use replica_pairing::{PairingMap, PairingResolver, UsageFilter, Volume, VolumeRole};

const SOURCES: usize = 1000;
const TARGETS: usize = 1500;

fn volume(device_id: String, blocks: u64, role: VolumeRole) -> Volume {
    Volume {
        wwn: format!("60000970000197800123{}", device_id),
        device_id,
        blocks,
        role,
        path: None,
    }
}

/// Capacities cycle through four sizes so every source has a match
fn pools() -> (Vec<Volume>, Vec<Volume>) {
    let sources = (0..SOURCES)
        .map(|i| volume(format!("{:05X}", i), 1024 << (i % 4), VolumeRole::ReplicationSource))
        .collect();
    let targets = (0..TARGETS)
        .map(|i| {
            volume(
                format!("{:05X}", 0x10000 + i),
                1024 << (i % 4),
                VolumeRole::ReplicationTarget,
            )
        })
        .collect();
    (sources, targets)
}

fn bench_resolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairing_resolver");
    group.throughput(Throughput::Elements(SOURCES as u64));

    let (sources, targets) = pools();

    group.bench_function("pair_1000_of_1500", |b| {
        b.iter_batched(
            || (targets.clone(), PairingMap::new()),
            |(mut targets, mut pairs)| {
                let outcome = PairingResolver::pair(black_box(&sources), &mut targets, &mut pairs);
                assert!(outcome.is_success());
                pairs
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_usage_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("usage_filter");
    group.throughput(Throughput::Elements(TARGETS as u64));

    let (_, targets) = pools();
    let mut extents = ExtentMap::new();
    for target in targets.iter().step_by(3) {
        let encoded = hex::encode(target.device_id.as_bytes());
        extents.push("000197800123", format!("00019780012353{}", encoded));
    }

    group.bench_function("filter_1500_targets", |b| {
        b.iter_batched(
            || targets.clone(),
            |mut targets| UsageFilter::apply(&mut targets, black_box(&extents), "000197800123"),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_resolver, bench_usage_filter);
criterion_main!(benches);
