use criterion::{black_box, criterion_group, criterion_main, Criterion};
use coda::{DirectedGraph, GraphFormat};
use std::io::Cursor;

/// Deterministic pseudo-random edge list with a share of reciprocal pairs.
fn edge_list(nodes: u32, per_node: u32) -> (Vec<u32>, Vec<u32>) {
    let mut sources = Vec::new();
    let mut dests = Vec::new();
    let mut state = 0x9e37_79b9u32;
    for u in 0..nodes {
        for _ in 0..per_node {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let v = state % nodes;
            sources.push(u);
            dests.push(v);
            if state % 3 == 0 {
                sources.push(v);
                dests.push(u);
            }
        }
    }
    (sources, dests)
}

fn bench_build(c: &mut Criterion) {
    let (sources, dests) = edge_list(10_000, 16);
    c.bench_function("directed_build_10k", |b| {
        b.iter(|| black_box(DirectedGraph::build(10_000, &sources, &dests).unwrap()));
    });
}

fn bench_queries(c: &mut Criterion) {
    let (sources, dests) = edge_list(10_000, 16);
    let graph = DirectedGraph::build(10_000, &sources, &dests).unwrap();

    c.bench_function("directed_has_edge", |b| {
        b.iter(|| {
            let mut hits = 0u32;
            for u in (0..10_000).step_by(97) {
                for v in (0..10_000).step_by(101) {
                    hits += u32::from(graph.has_edge(u, v));
                }
            }
            black_box(hits)
        });
    });

    c.bench_function("directed_bi_neighbors_scan", |b| {
        b.iter(|| {
            let total: usize = (0..graph.node_num()).map(|u| graph.bi_neighbors(u).len()).sum();
            black_box(total)
        });
    });
}

fn bench_storage(c: &mut Criterion) {
    let (sources, dests) = edge_list(10_000, 16);
    let graph = DirectedGraph::build(10_000, &sources, &dests).unwrap();

    for (name, format) in [("plain", GraphFormat::Plain), ("compressed", GraphFormat::Compressed)] {
        let mut bytes = Vec::new();
        graph.save(&mut bytes, format).unwrap();

        c.bench_function(&format!("directed_save_{name}"), |b| {
            b.iter(|| {
                let mut out = Vec::with_capacity(bytes.len());
                graph.save(&mut out, format).unwrap();
                black_box(out)
            });
        });

        c.bench_function(&format!("directed_load_{name}"), |b| {
            b.iter(|| black_box(<DirectedGraph>::load(&mut Cursor::new(&bytes)).unwrap()));
        });
    }
}

criterion_group!(benches, bench_build, bench_queries, bench_storage);
criterion_main!(benches);
