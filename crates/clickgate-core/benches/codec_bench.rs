//! Criterion benchmarks for the click event codec.
//!
//! Every verified click is decoded once and re-encoded once (for the
//! signature check), so both directions sit on the click hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package clickgate-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use clickgate_core::domain::click::{ClickEvent, ExtraInfo};
use clickgate_core::protocol::codec::{decode_click_event, encode_click_event, signing_bytes};

// ── Event fixtures ────────────────────────────────────────────────────────────

fn make_unsigned_point() -> ClickEvent {
    ClickEvent::point(540.5, 1170.25, 123_456_789)
}

fn make_signed_point() -> ClickEvent {
    make_unsigned_point().with_extra_info(ExtraInfo::present(vec![0xA5; 32]).unwrap())
}

fn make_signed_key() -> ClickEvent {
    ClickEvent::key(2054, 123_456_789).with_extra_info(ExtraInfo::present(vec![0x5A; 32]).unwrap())
}

fn make_attested_point() -> ClickEvent {
    make_unsigned_point().with_extra_info(ExtraInfo::present(vec![0x11; 1024]).unwrap())
}

fn fixtures() -> Vec<(&'static str, ClickEvent)> {
    vec![
        ("PointUnsigned", make_unsigned_point()),
        ("PointHmac", make_signed_point()),
        ("KeyHmac", make_signed_key()),
        ("PointAttested1K", make_attested_point()),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_click_event");
    for (name, event) in fixtures() {
        group.bench_with_input(BenchmarkId::new("event", name), &event, |b, event| {
            b.iter(|| encode_click_event(black_box(event)).expect("encode must succeed"))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_click_event");
    for (name, event) in fixtures() {
        let bytes = encode_click_event(&event).expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("event", name), &bytes, |b, bytes| {
            b.iter(|| decode_click_event(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

fn bench_signing_bytes(c: &mut Criterion) {
    let event = make_signed_point();
    c.bench_function("signing_bytes/PointHmac", |b| {
        b.iter(|| signing_bytes(black_box(&event)))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_signing_bytes);
criterion_main!(benches);
