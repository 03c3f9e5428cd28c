//! Benchmarks for graph construction and force layout.
//!
//! Uses synthetic blocks shaped like mainnet traffic: a few hot contracts
//! receiving most transactions plus a long tail of unique senders.
//! Run with: `cargo bench --package flow-graph`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flow_graph::{BlockGraph, ForceConfig, Scene, Simulation, TransactionRecord, Viewport};

/// Generates `n` records where nine in ten senders pay one of five hot contracts.
fn sample_records(n: usize) -> Vec<TransactionRecord> {
    (0..n)
        .map(|i| {
            let recipient = if i % 10 == 0 {
                format!("0x{:040x}", i)
            } else {
                format!("0xc0de{:036x}", i % 5)
            };
            TransactionRecord::single(format!("0x{:040x}", i + 1_000_000), recipient)
        })
        .collect()
}

/// Benchmark: build the graph for a 200-transaction block.
fn bench_build_200_txs(c: &mut Criterion) {
    let records = sample_records(200);
    c.bench_function("build_200_txs", |b| {
        b.iter(|| BlockGraph::build(black_box(&records)))
    });
}

/// Benchmark: lay out a 200-transaction block until it cools, redrawing every tick.
fn bench_layout_200_txs(c: &mut Criterion) {
    let graph = BlockGraph::build(&sample_records(200));
    let viewport = Viewport::default();

    c.bench_function("layout_200_txs", |b| {
        b.iter(|| {
            let mut sim = Simulation::new(&graph, ForceConfig::viewer(viewport.width, viewport.height));
            let mut scene = Scene::new(&graph);
            sim.run(|s| scene.redraw(s));
            black_box(scene)
        })
    });
}

criterion_group!(benches, bench_build_200_txs, bench_layout_200_txs);
criterion_main!(benches);
