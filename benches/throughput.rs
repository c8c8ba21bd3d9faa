//! Values-per-second through a small graph, per backend.
//!
//! Pipelines are single-shot, so each iteration builds and runs a fresh
//! graph; build cost is negligible next to pumping the values through.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowpipe::nodes::{Identity, IterSrc, Map};
use flowpipe::{Backend, Pipeline, Value};

const VALUES: i64 = 10_000;

fn run_chain(backend: Backend) -> Vec<Value> {
    let pipeline = Pipeline::with_backend(backend);
    let src = pipeline.add(IterSrc::new(0..VALUES)).unwrap();
    let double = pipeline
        .add(Map::new(|v| Value::Int(v.as_int().unwrap_or(0) * 2)))
        .unwrap();
    let sink = pipeline.add(Identity::new()).unwrap();
    src.feeds_into(&double).unwrap().feeds_into(&sink).unwrap();
    sink.results().unwrap()
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("three_node_chain");
    group.throughput(Throughput::Elements(VALUES as u64));
    for backend in [Backend::Sync, Backend::Thread] {
        group.bench_with_input(
            BenchmarkId::from_parameter(backend),
            &backend,
            |b, &backend| {
                b.iter(|| {
                    let results = run_chain(backend);
                    assert_eq!(results.len(), VALUES as usize);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_chain);
criterion_main!(benches);
