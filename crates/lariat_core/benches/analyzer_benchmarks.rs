//! Criterion benchmarks for the analyzer pipeline.
//!
//! Run with: `cargo bench --package lariat_core`

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use lariat_core::closure::{self, globals, shape};
use lariat_core::parser::{parser, scanner};

const SMALL_ARROW: &str = "x => x + y";

const METHOD: &str = "handleEvent(event) { \
    const { type, payload } = event; \
    if (type === 'create') { return this.client.create(payload); } \
    return this.client.update(payload, defaults.retries); \
}";

const LOWERED_ASYNC: &str = "function upload(bucket) { \
    return __awaiter(this, void 0, void 0, function* () { \
        const data = yield readBody(); \
        for (const chunk of split(data, limits.chunkSize)) { \
            yield store.put(bucket, chunk); \
        } \
        return manifest.finish(bucket); \
    }); \
}";

fn bench_scan(c: &mut Criterion) {
    c.bench_function("scan_method", |b| {
        b.iter(|| scanner::tokenize(black_box(METHOD)).unwrap());
    });
}

fn bench_parse(c: &mut Criterion) {
    let wrapped = format!("(function () {{ return {SMALL_ARROW}; }})");
    c.bench_function("parse_wrapped_function", |b| {
        b.iter(|| parser::parse(black_box(&wrapped)).unwrap());
    });
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_method", |b| {
        b.iter(|| shape::classify(black_box(METHOD)).unwrap());
    });
}

fn bench_analyze(c: &mut Criterion) {
    c.bench_function("analyze_small_arrow", |b| {
        b.iter(|| closure::analyze(black_box(SMALL_ARROW), globals::is_node_global).unwrap());
    });
    c.bench_function("analyze_lowered_async", |b| {
        b.iter(|| closure::analyze(black_box(LOWERED_ASYNC), globals::is_node_global).unwrap());
    });
}

criterion_group!(benches, bench_scan, bench_parse, bench_classify, bench_analyze);
criterion_main!(benches);
