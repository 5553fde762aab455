/*
Measures the cost of one scheduler tick on the buffer side: drain under the lock plus
frame encoding, with an empty queue and with a backlog larger than one frame can carry.
A second group drains while a producer thread keeps enqueueing, to expose lock contention.
*/

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use std::{
    hint::black_box,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use kicker_telemetry::{
    codec::frame::BounceEvent,
    sender::buffer::{OverflowPolicy, TelemetryBuffer},
};

const BUDGET: usize = 14;

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_drain");

    group.bench_function(BenchmarkId::new("header_only", BUDGET), |b| {
        let buffer = TelemetryBuffer::new();
        buffer.set_coordinate(65, 30);
        b.iter(|| black_box(buffer.drain(black_box(BUDGET))));
    });

    for backlog in [3usize, 64, 1024] {
        group.bench_with_input(BenchmarkId::new("backlog", backlog), &backlog, |b, &n| {
            let buffer = TelemetryBuffer::with_capacity(n, OverflowPolicy::DropOldest);
            b.iter(|| {
                for i in 0..3u8 {
                    buffer.enqueue_bounce(BounceEvent::new(i, 50, i, 3));
                }
                black_box(buffer.drain(BUDGET))
            });
        });
    }

    group.finish();
}

fn bench_contended_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_drain_contended");
    group.measurement_time(Duration::from_secs(5));

    let buffer = Arc::new(TelemetryBuffer::new());
    let running = Arc::new(AtomicBool::new(true));
    let producer = {
        let buffer = buffer.clone();
        let running = running.clone();
        thread::spawn(move || {
            let mut frame = 0u8;
            while running.load(Ordering::Relaxed) {
                buffer.set_coordinate(frame & 0x7F, frame & 0x3F);
                buffer.enqueue_bounce(BounceEvent::new(frame, 10, frame, 1));
                frame = frame.wrapping_add(1);
            }
        })
    };

    group.bench_function("drain_vs_producer", |b| {
        b.iter(|| black_box(buffer.drain(BUDGET)));
    });

    running.store(false, Ordering::Relaxed);
    let _ = producer.join();
    group.finish();
}

criterion_group!(benches, bench_drain, bench_contended_drain);
criterion_main!(benches);
