//! Inbound hot-path benchmark suite.
//!
//! Benchmarks the per-frame work done for every inbound message:
//! - Listener dispatch at different fan-outs: 1, 8, 64
//! - Frame decoding with and without nested JSON fields
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use roomlink::{EventBus, Frame};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const LISTENER_COUNTS: &[usize] = &[1, 8, 64];

const PLAIN_FRAME: &str = r#"{"event":"chat","data":{"text":"hello"},"receiver":{"type":"room","id":"lobby"},"time":1700000000000}"#;

const NESTED_FRAME: &str = r#"{"event":"chat","data":{"text":"hello"},"sender":{"type":"user","id":7,"info":"{\"name\":\"ann\",\"avatar\":\"a.png\"}"},"meta":{"user_info":"{\"role\":\"admin\"}"},"time":1700000000000}"#;

// ============================================================================
// Benchmark: Bus Dispatch
// ============================================================================

fn bench_bus_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_dispatch");

    for &count in LISTENER_COUNTS {
        let bus: EventBus<u64> = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..count {
            let hits = Arc::clone(&hits);
            bus.on("chat", move |value: &u64| {
                hits.fetch_add(*value as usize, Ordering::Relaxed);
            });
        }

        group.bench_with_input(BenchmarkId::new("listeners", count), &bus, |b, bus| {
            b.iter(|| bus.dispatch(black_box("chat"), black_box(&1)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Frame Decode
// ============================================================================

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    group.bench_function("plain", |b| {
        b.iter(|| Frame::decode(black_box(PLAIN_FRAME)));
    });

    group.bench_function("nested", |b| {
        b.iter(|| Frame::decode(black_box(NESTED_FRAME)));
    });

    group.finish();
}

criterion_group!(benches, bench_bus_dispatch, bench_frame_decode);
criterion_main!(benches);
