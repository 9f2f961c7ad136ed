//! # Rate Limiter Benchmarks
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tierbucket::{
    BucketRegistry, MemoryOrdering, RateLimiterConfig, Tier, TierLimits, TierTable, TokenBucket,
};

fn large_tiers() -> TierTable {
    TierTable::default().with(Tier::Enterprise, TierLimits::new(u32::MAX as u64, 1_000))
}

/// Single-threaded consumption on one bucket
fn bench_single_consume(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_consume");
    group.throughput(Throughput::Elements(1));

    group.bench_function("try_consume", |b| {
        let bucket = TokenBucket::new(Tier::Enterprise, large_tiers());
        b.iter(|| std::hint::black_box(bucket.try_consume()));
    });

    group.bench_function("try_consume_empty", |b| {
        let bucket = TokenBucket::new(Tier::Free, TierTable::default());
        while bucket.try_consume() {}
        b.iter(|| std::hint::black_box(bucket.try_consume()));
    });

    group.finish();
}

/// Memory ordering variants
fn bench_memory_orderings(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_orderings");

    for (name, ordering) in [
        ("Relaxed", MemoryOrdering::Relaxed),
        ("AcquireRelease", MemoryOrdering::AcquireRelease),
        ("Sequential", MemoryOrdering::Sequential),
    ] {
        group.bench_function(name, |b| {
            let bucket = TokenBucket::with_ordering(Tier::Enterprise, large_tiers(), ordering);
            b.iter(|| std::hint::black_box(bucket.try_consume()));
        });
    }

    group.finish();
}

/// Many threads hammering one bucket
fn bench_contended_consume(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_consume");

    for num_threads in [2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1_000));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                b.iter_custom(|iters| {
                    let mut total = Duration::ZERO;

                    for _ in 0..iters {
                        let bucket = Arc::new(TokenBucket::new(Tier::Enterprise, large_tiers()));
                        let start = std::time::Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|_| {
                                let bucket = bucket.clone();
                                thread::spawn(move || {
                                    for _ in 0..1_000 {
                                        bucket.try_consume();
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total += start.elapsed();
                    }

                    total
                });
            },
        );
    }

    group.finish();
}

/// Registry lookups and admission
fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    let registry =
        BucketRegistry::with_config(RateLimiterConfig::default().with_tiers(large_tiers()))
            .unwrap();
    for i in 0..10_000 {
        registry.register_or_upgrade(&format!("user-{}", i), Tier::Enterprise);
    }

    group.bench_function("hit_api_existing", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % 10_000;
            std::hint::black_box(registry.hit_api(&format!("user-{}", i)))
        });
    });

    group.bench_function("hit_api_unknown", |b| {
        b.iter(|| std::hint::black_box(registry.hit_api("nobody")));
    });

    group.bench_function("register_or_upgrade_existing", |b| {
        b.iter(|| registry.register_or_upgrade("user-42", Tier::Enterprise));
    });

    group.finish();
}

/// Full refill sweeps at different registry sizes
fn bench_refill_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("refill_sweep");

    for size in [100usize, 1_000, 10_000] {
        let registry = BucketRegistry::new();
        for i in 0..size {
            registry.register_or_upgrade(&format!("user-{}", i), Tier::ALL[i % 3]);
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| std::hint::black_box(registry.refill_all()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_consume,
    bench_memory_orderings,
    bench_contended_consume,
    bench_registry,
    bench_refill_sweep
);
criterion_main!(benches);
