//! Construction cost with cold and warm frame caches, and literal parsing.

use canto::{BuildPipeline, Context, DefId, DefinitionGraph, Value, parse_array};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

/// `n` chained definitions: `d0 = 0`, `d1 = d0`, ...
fn chain(n: usize) -> (Arc<DefinitionGraph>, DefId) {
    let mut source_code = String::from("d0 = 0\n");
    for i in 1..n {
        source_code.push_str(&format!("d{i} = d{}\n", i - 1));
    }
    let mut graph = DefinitionGraph::new();
    let site = graph.add_site("main");
    if let Err(error) = BuildPipeline::new(&mut graph).build_source(&source_code, site) {
        panic!("benchmark source failed to build:\n{error}");
    }
    (Arc::new(graph), site)
}

fn bench_construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("construct_chain");

    for n in [10, 50, 200] {
        let (graph, site) = chain(n);
        let last = format!("d{}", n - 1);

        group.bench_with_input(BenchmarkId::new("cold", n), &n, |b, _| {
            b.iter(|| {
                let mut context = Context::new(graph.clone(), site);
                let value = context.construct(&last, &[]).unwrap_or(Value::Null);
                context.discard();
                black_box(value)
            });
        });

        group.bench_with_input(BenchmarkId::new("warm", n), &n, |b, _| {
            let mut context = Context::new(graph.clone(), site);
            let _ = context.construct(&last, &[]);
            b.iter(|| black_box(context.construct(&last, &[])));
        });
    }

    group.finish();
}

fn bench_literal(c: &mut Criterion) {
    let (graph, site) = chain(10);
    let context = Context::new(graph, site);
    c.bench_function("parse_array_literal", |b| {
        b.iter(|| black_box(parse_array(&context, "[1, 2, d9, {a = d0}]")));
    });
}

criterion_group!(benches, bench_construct, bench_literal);
criterion_main!(benches);
