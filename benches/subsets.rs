//! Benchmarks for the conditioning-set enumerator.
//!
//! The enumerator sits in the engine's innermost loop, so per-subset
//! allocation and advancement cost bound how wide a neighborhood the
//! orientation search can afford.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shiftpag::core::VarId;
use shiftpag::subsets::Subsets;

/// Enumerates all subsets of size at most 2 over a 20-item pool
/// (1 + 20 + 190 = 211 subsets).
fn bench_subsets_20_choose_up_to_2(c: &mut Criterion) {
    let items: Vec<VarId> = (0..20).map(VarId::new).collect();
    c.bench_function("subsets_20_choose_up_to_2", |b| {
        b.iter(|| {
            let count = Subsets::new(black_box(&items), black_box(2)).count();
            assert_eq!(count, 211);
        });
    });
}

/// Enumerates all subsets of size at most 3 over a 30-item pool, the upper
/// end of what a realistic neighborhood search ever touches.
fn bench_subsets_30_choose_up_to_3(c: &mut Criterion) {
    let items: Vec<VarId> = (0..30).map(VarId::new).collect();
    c.bench_function("subsets_30_choose_up_to_3", |b| {
        b.iter(|| {
            let count = Subsets::new(black_box(&items), black_box(3)).count();
            assert_eq!(count, 1 + 30 + 435 + 4060);
        });
    });
}

criterion_group!(
    benches,
    bench_subsets_20_choose_up_to_2,
    bench_subsets_30_choose_up_to_3
);
criterion_main!(benches);
