// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode Benchmark
//!
//! Measures catalog-line parsing and event-line decoding throughput,
//! the two hot paths of catalog load and listen streams.

use criterion::{criterion_group, criterion_main, Criterion};
use ebus::{decode_line, decode_msgdef, MsgDefs};
use std::hint::black_box as bb;
use std::sync::Arc;

const CATALOG_LINE: &str = "r,bai,Status01,temp1,s,D2C,,°C,,temp2,s,D2C,,°C,,onoff,s,UCH,0=off;1=on,,";

fn bench_decode_msgdef(c: &mut Criterion) {
    c.bench_function("decode_msgdef", |b| {
        b.iter(|| decode_msgdef(bb(CATALOG_LINE)).unwrap());
    });
}

fn bench_decode_line(c: &mut Criterion) {
    let mut msgdefs = MsgDefs::new();
    msgdefs.add(Arc::new(decode_msgdef(CATALOG_LINE).unwrap()));
    c.bench_function("decode_line", |b| {
        b.iter(|| decode_line(&msgdefs, bb("bai Status01 = 27.5;28.0;on")).unwrap());
    });
}

criterion_group!(benches, bench_decode_msgdef, bench_decode_line);
criterion_main!(benches);
