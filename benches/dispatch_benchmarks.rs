//! Criterion benchmarks for rust_log_pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_log_pipeline::combine;
use rust_log_pipeline::core::interpolate::interpolate;
use rust_log_pipeline::formats::{json, label, simple, timestamp, Format};
use rust_log_pipeline::prelude::*;
use serde_json::json;
use std::io;

fn null_logger(format: FormatRef, transports: usize) -> Logger {
    let mut builder = Logger::builder().format(format);
    for i in 0..transports {
        builder = builder.transport(StreamTransport::new(format!("null-{}", i), io::sink()));
    }
    builder.build().unwrap()
}

// ============================================================================
// Dispatch Benchmarks
// ============================================================================

fn bench_sync_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_dispatch");
    group.throughput(Throughput::Elements(1));

    let logger = null_logger(json().into_format(), 1);
    group.bench_function("json_one_transport", |b| {
        b.iter(|| logger.log("info", black_box("request handled")).unwrap());
    });

    let fan_out = null_logger(json().into_format(), 4);
    group.bench_function("json_four_transports", |b| {
        b.iter(|| fan_out.log("info", black_box("request handled")).unwrap());
    });

    group.bench_function("filtered_out", |b| {
        b.iter(|| logger.log("debug", black_box("below threshold")).unwrap());
    });

    group.finish();
}

fn bench_async_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_dispatch");
    group.throughput(Throughput::Elements(1));

    let logger = Logger::builder()
        .async_mode(10_000)
        .overflow_policy(OverflowPolicy::Block)
        .transport(StreamTransport::new("null", io::sink()))
        .build()
        .unwrap();

    group.bench_function("json_block", |b| {
        b.iter(|| logger.log("info", black_box("queued")).unwrap());
    });

    group.finish();
    logger.end();
}

// ============================================================================
// Format Chain Benchmarks
// ============================================================================

fn bench_format_chains(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_chains");

    let record = Record::new("info", "user signed in")
        .with_meta("user", "ana")
        .with_meta("attempt", 2);

    let chains = [
        ("json", json().into_format()),
        ("simple", simple().into_format()),
        ("timestamp_label_json", combine!(timestamp(), label("auth"), json())),
    ];
    for (name, chain) in chains {
        group.bench_function(name, |b| {
            b.iter(|| chain.transform(black_box(record.clone())));
        });
    }

    group.finish();
}

fn bench_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation");

    group.bench_function("three_placeholders", |b| {
        b.iter(|| {
            interpolate(
                black_box("%s fetched %d rows in %j"),
                vec!["worker".into(), 42.into(), json!({"ms": 3}).into()],
            )
        });
    });

    group.bench_function("with_leftover_meta", |b| {
        b.iter(|| {
            interpolate(
                black_box("cache miss"),
                vec![json!({"key": "user:1", "ttl": 60}).into()],
            )
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sync_dispatch,
    bench_async_dispatch,
    bench_format_chains,
    bench_interpolation
);

criterion_main!(benches);
