//! Criterion micro-benchmarks for epsilon-greedy action selection.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tether_bench::reference_policy;
use tether_core::StateId;

/// Benchmark: choose_action at several exploration rates.
fn bench_choose_action(c: &mut Criterion) {
    let mut group = c.benchmark_group("choose_action");
    for epsilon in [0.0, 0.1, 1.0] {
        let mut policy = reference_policy(epsilon, 7);
        group.bench_function(format!("epsilon_{epsilon}"), |b| {
            let mut state = 0u64;
            b.iter(|| {
                state = (state + 7_919) % 1_000_000;
                black_box(policy.choose_action(StateId(state)))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_choose_action);
criterion_main!(benches);
