//! Benchmarks for dispatch strategy overhead and queued-call throughput.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use wpool::config::PoolOptions;
use wpool::core::executor::FnExecutor;
use wpool::runtime;

fn runtime_handle() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_direct_selection_strategies(c: &mut Criterion) {
    let rt = runtime_handle();
    let pool_name = "bench-direct-selection";
    let options = PoolOptions::new().with_workers(16);
    let executor = FnExecutor::new(|x: i32| async move { x });
    runtime::start_link(pool_name, options, executor).unwrap();

    let mut group = c.benchmark_group("direct_selection");
    group.bench_function("best_worker", |b| {
        b.iter(|| black_box(runtime::best_worker::<i32, i32>(pool_name).unwrap()));
    });
    group.bench_function("random_worker", |b| {
        b.iter(|| black_box(runtime::random_worker::<i32, i32>(pool_name).unwrap()));
    });
    group.bench_function("next_worker", |b| {
        b.iter(|| black_box(runtime::next_worker::<i32, i32>(pool_name).unwrap()));
    });
    group.bench_function("hash_worker", |b| {
        b.iter(|| black_box(runtime::hash_worker::<i32, i32, _>(pool_name, &"tenant-key").unwrap()));
    });
    group.finish();

    rt.block_on(async { runtime::stop::<i32, i32>(pool_name).unwrap() });
}

fn bench_call_available_worker_throughput(c: &mut Criterion) {
    let rt = runtime_handle();
    let mut group = c.benchmark_group("call_available_worker_throughput");

    for workers in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, &workers| {
                let pool_name = format!("bench-call-{workers}");
                let options = PoolOptions::new().with_workers(workers);
                let executor = FnExecutor::new(|x: i32| async move { x + 1 });
                runtime::start_link(&pool_name, options, executor).unwrap();

                b.to_async(&rt).iter(|| {
                    let pool_name = pool_name.clone();
                    async move {
                        let result = runtime::call_available_worker::<i32, i32>(
                            &pool_name,
                            1,
                            Duration::from_secs(5),
                        )
                        .await
                        .unwrap();
                        black_box(result);
                    }
                });

                rt.block_on(async { runtime::stop::<i32, i32>(&pool_name).unwrap() });
            },
        );
    }
    group.finish();
}

fn bench_cast_to_available_worker(c: &mut Criterion) {
    let rt = runtime_handle();
    let pool_name = "bench-cast";
    let options = PoolOptions::new().with_workers(8);
    let executor = FnExecutor::new(|_: i32| async move {});
    runtime::start_link(pool_name, options, executor).unwrap();

    c.bench_function("cast_to_available_worker", |b| {
        b.iter(|| {
            runtime::cast_to_available_worker::<i32, ()>(pool_name, 1).unwrap();
        });
    });

    rt.block_on(async { runtime::stop::<i32, ()>(pool_name).unwrap() });
}

criterion_group!(
    strategy_benches,
    bench_direct_selection_strategies,
    bench_call_available_worker_throughput,
    bench_cast_to_available_worker
);

criterion_main!(strategy_benches);
