use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use txguard_correlation::{ExecutionContext, GuidQueue};

/// Consumer-facing cost of `next_id` (suffixes are pre-computed by the
/// producer thread; the hot path is a queue pop plus a timestamp format).
fn bench_next_id(c: &mut Criterion) {
    let queue = GuidQueue::start();

    let mut group = c.benchmark_group("guid");
    group.throughput(Throughput::Elements(1));
    group.bench_function("next_id", |b| {
        b.iter(|| black_box(queue.next_id().unwrap()));
    });
    group.finish();
}

/// Snapshot cost relative to context size.
fn bench_snapshot(c: &mut Criterion) {
    let _guard = ExecutionContext::initialize("BENCHGUID");
    for i in 0..32 {
        ExecutionContext::put(format!("key-{i}"), i);
    }

    c.bench_function("context/snapshot_32_keys", |b| {
        b.iter(|| black_box(ExecutionContext::snapshot()));
    });
}

criterion_group!(benches, bench_next_id, bench_snapshot);
criterion_main!(benches);
