//! # Selection Hot Path Benchmarks
//!
//! Criterion benchmarks for the engine's selection and reporting paths.
//! Selection must stay O(n) over the candidate pool with small constants;
//! these benches watch the common pool sizes (5 and 20 candidates) plus
//! the outcome-reporting and retry-delay paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use failover_core::{FailoverContext, FailoverEngine, SelectionStrategy};

fn seeded_engine(pool: &[String]) -> FailoverEngine {
    let engine = FailoverEngine::default();
    let ctx = FailoverContext::new("seed", "ohlcv");
    for (index, plugin_id) in pool.iter().enumerate() {
        for _ in 0..20 {
            engine.record_plugin_performance(
                plugin_id,
                true,
                0.05 + index as f64 * 0.01,
                &ctx,
            );
        }
    }
    engine
}

fn candidate_pool(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("plugin-{i}")).collect()
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_optimal_plugin");

    for pool_size in [5_usize, 20] {
        let pool = candidate_pool(pool_size);
        let engine = seeded_engine(&pool);
        let ctx = FailoverContext::new("bench", "ohlcv");

        for strategy in [
            SelectionStrategy::Intelligent,
            SelectionStrategy::WeightedRoundRobin,
            SelectionStrategy::LeastConnections,
            SelectionStrategy::FastestResponse,
        ] {
            group.bench_with_input(
                BenchmarkId::new(strategy.as_str(), pool_size),
                &pool,
                |b, pool| {
                    b.iter(|| {
                        let result = engine
                            .select_optimal_plugin(black_box(pool), &ctx, Some(strategy))
                            .unwrap();
                        // Release the reservation so load never saturates.
                        engine.record_plugin_performance(
                            &result.selected_plugin,
                            true,
                            0.05,
                            &ctx,
                        );
                        result
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_record_performance(c: &mut Criterion) {
    let pool = candidate_pool(5);
    let engine = seeded_engine(&pool);
    let ctx = FailoverContext::new("bench", "ohlcv");

    c.bench_function("record_plugin_performance", |b| {
        b.iter(|| {
            engine.record_plugin_performance(black_box("plugin-0"), true, black_box(0.07), &ctx);
        });
    });
}

fn bench_retry_delay(c: &mut Criterion) {
    let engine = FailoverEngine::default();

    c.bench_function("calculate_retry_delay", |b| {
        b.iter(|| engine.calculate_retry_delay(black_box(3)));
    });
}

criterion_group!(
    benches,
    bench_selection,
    bench_record_performance,
    bench_retry_delay
);
criterion_main!(benches);
