//! Cleanup pass benchmarks.
//!
//! Run with: `cargo bench --bench eviction`
//!
//! Measures the cost of bringing an over-budget generation back to its
//! lower watermark, for count and RAM budgets and both cleanup modes.

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gencache::config::CacheConfig;
use gencache::generation::{CacheState, Generation};

const SIZES: [usize; 3] = [1_024, 16_384, 131_072];

fn open(config: CacheConfig) -> Generation<u64, u64> {
    let cache = Generation::open(config, None);
    cache.set_state(CacheState::Live);
    cache
}

// ============================================================================
// Single Pass Cost
// ============================================================================

/// Fills to exactly `max`, then times the put that tips the generation over.
fn bench_count_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_cleanup_pass");
    for &max in &SIZES {
        group.throughput(Throughput::Elements(max as u64));
        group.bench_with_input(BenchmarkId::from_parameter(max), &max, |b, &max| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let cache = open(CacheConfig::builder().max_size(max).build().unwrap());
                    for i in 0..max as u64 {
                        cache.put(i, i);
                    }
                    let start = Instant::now();
                    black_box(cache.put(u64::MAX, 0));
                    total += start.elapsed();
                }
                total
            })
        });
    }
    group.finish();
}

fn bench_ram_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("ram_cleanup_pass");
    for mb in [1u64, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{mb}MB")), &mb, |b, &mb| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let cache = open(CacheConfig::builder().max_ram_mb(mb).build().unwrap());
                    let mut key = 0u64;
                    while cache.ram_bytes_used() + 256 <= mb * 1024 * 1024 {
                        cache.put(key, key);
                        key += 1;
                    }
                    let start = Instant::now();
                    while cache.cleanup_passes() == 0 {
                        cache.put(key, key);
                        key += 1;
                    }
                    total += start.elapsed();
                }
                total
            })
        });
    }
    group.finish();
}

// ============================================================================
// Sustained Churn
// ============================================================================

fn bench_churn_modes(c: &mut Criterion) {
    const OPS: u64 = 200_000;
    let mut group = c.benchmark_group("churn_put_ns");
    group.throughput(Throughput::Elements(OPS));
    for (label, cleanup_thread) in [("inline", false), ("background", true)] {
        group.bench_function(label, |b| {
            b.iter_custom(|iters| {
                let cache = open(
                    CacheConfig::builder()
                        .max_size(16_384)
                        .cleanup_thread(cleanup_thread)
                        .build()
                        .unwrap(),
                );
                let start = Instant::now();
                for it in 0..iters {
                    for i in 0..OPS {
                        cache.put(it * OPS + i, i);
                    }
                }
                let elapsed = start.elapsed();
                cache.close();
                elapsed
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_count_pass, bench_ram_pass, bench_churn_modes);
criterion_main!(benches);
