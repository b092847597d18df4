//! Criterion micro-benchmarks for opening snapshots and building layouts.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use nbsnap_bench::{reference_snapshot, stress_snapshot};
use nbsnap_snapshot::{FamilyIndex, Snapshot, TypeMap};

/// Benchmark: open the 8-shard reference snapshot (shards, counts, layout, header).
fn bench_open_reference(c: &mut Criterion) {
    let fx = reference_snapshot(42);

    c.bench_function("open_reference_8_shards", |b| {
        b.iter(|| {
            let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
            black_box(snap.num_particles());
        });
    });
}

/// Benchmark: open the 32-shard stress snapshot.
fn bench_open_stress(c: &mut Criterion) {
    let fx = stress_snapshot(42);

    c.bench_function("open_stress_32_shards", |b| {
        b.iter(|| {
            let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
            black_box(snap.num_particles());
        });
    });
}

/// Benchmark: rebuild the family index from already-read counts.
fn bench_family_index(c: &mut Criterion) {
    let fx = stress_snapshot(42);
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let types: TypeMap = snap.type_map().clone();
    let counts = snap.counts().clone();

    c.bench_function("family_index_build", |b| {
        b.iter(|| {
            let index = FamilyIndex::build(&types, &counts);
            black_box(&index);
        });
    });
}

criterion_group!(
    benches,
    bench_open_reference,
    bench_open_stress,
    bench_family_index
);
criterion_main!(benches);
