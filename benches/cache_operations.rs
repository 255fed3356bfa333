//! Benchmark suite for cache operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relcount::{
    Counter, Direction, EdgeRecord, MemoryGraph, RelcountConfig, RelcountModule, Shape, ShapeCache,
};

/// One hub vertex (0) with `degree` outgoing edges spread over ten strengths
fn create_hub(degree: usize, module: &mut RelcountModule) -> MemoryGraph {
    let mut graph = MemoryGraph::new();
    let mut tx = graph.begin();
    for v in 0..=degree {
        tx.create_vertex(v as u128);
    }
    for i in 0..degree {
        tx.create_edge(
            EdgeRecord::new(i as u128, 0, (i + 1) as u128, "FOLLOWS")
                .with_property("strength", (i % 10) as i64)
                .with_property("since", format!("20{:02}", i % 7)),
        );
    }
    graph.commit(tx, module).unwrap();
    graph
}

fn query() -> Shape {
    Shape::wildcard("FOLLOWS", Direction::Outgoing).with("strength", "3")
}

fn bench_create_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_edges");

    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
                black_box(create_hub(size, &mut module));
            });
        });
    }

    group.finish();
}

fn bench_create_edges_batched(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_edges_batched");

    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
                module.start_batch().unwrap();
                let mut graph = create_hub(size, &mut module);
                module.end_batch(&mut graph).unwrap();
                black_box(graph);
            });
        });
    }

    group.finish();
}

fn bench_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("count");

    for size in [100, 1000, 10000] {
        let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
        let graph = create_hub(size, &mut module);

        group.bench_with_input(BenchmarkId::new("naive", size), &size, |b, _| {
            let counter = module.naive_counter();
            b.iter(|| black_box(counter.count(&graph, black_box(0), &query()).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("cached", size), &size, |b, _| {
            let counter = module.cached_counter();
            b.iter(|| black_box(counter.count(&graph, black_box(0), &query()).unwrap()));
        });
    }

    group.finish();
}

fn bench_compaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("compaction");

    for threshold in [1, 5, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(threshold), &threshold, |b, &threshold| {
            b.iter(|| {
                let config = RelcountConfig::new().with_threshold(threshold);
                let mut module = RelcountModule::new(config).unwrap();
                black_box(create_hub(500, &mut module));
            });
        });
    }

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");

    for size in [100, 1000] {
        let mut module = RelcountModule::new(RelcountConfig::new()).unwrap();
        let mut graph = create_hub(size, &mut module);
        let mut cache = ShapeCache::new(module.config()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| cache.rebuild(&mut graph, black_box(0), module.strategies()).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_edges,
    bench_create_edges_batched,
    bench_count,
    bench_compaction,
    bench_rebuild
);
criterion_main!(benches);
