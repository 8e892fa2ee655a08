//! Benchmarks the gap-fit allocator at the cardinality the format targets
//! (~10^5 live entries): steady-state `insert` cost and a `find_gap` scan
//! against a densely packed Index.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use softie::{Entry, Index};

const DATA_START: u64 = 12;

fn densely_packed_index(count: u64, entry_len: u64) -> Index {
    let mut idx = Index::new();
    for i in 0..count {
        idx.insert(Entry::new(format!("entry-{i}"), DATA_START + i * entry_len, entry_len));
    }
    idx
}

fn bench_find_gap(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_gap");
    for &count in &[1_000u64, 10_000, 100_000] {
        let idx = densely_packed_index(count, 32);
        group.bench_with_input(BenchmarkId::from_parameter(count), &idx, |b, idx| {
            b.iter(|| idx.find_gap(black_box(32)));
        });
    }
    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &count in &[1_000u64, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || densely_packed_index(count, 32),
                |mut idx| {
                    let start = idx.find_gap(32);
                    idx.insert(Entry::new("new-entry", start, 32));
                    black_box(idx)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_gap, bench_insert);
criterion_main!(benches);
