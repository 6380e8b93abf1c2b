//! Benchmarks for serving the latest frame
//!
//! Measures what an HTTP handler pays per request:
//! - Cache reads, idle and while a producer publishes continuously
//! - Envelope encoding of a camera-sized frame
//! - The full `respond` path
//!
//! Platform: Cross-platform, no camera needed
//!
//! Run: `cargo bench --features benchmark --bench cache_read`

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use fleetcap::sources::SyntheticSource;
use fleetcap::{CaptureEndpoint, Frame, cache, envelope};
use hyper::Method;
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Roughly a 1080p JPEG
const FRAME_LEN: usize = 300 * 1024;

fn bench_cache_read(c: &mut Criterion) {
    let (mut publisher, cache) = cache::channel();
    publisher.publish(Frame::new(SyntheticSource::frame_bytes(0, FRAME_LEN)));

    let mut group = c.benchmark_group("cache_read");

    group.bench_function("idle", |b| b.iter(|| black_box(cache.read())));

    // Publisher thread swaps frames as fast as it can for the rest of the group
    let running = Arc::new(AtomicBool::new(true));
    let writer = {
        let running = Arc::clone(&running);
        let frames: Vec<Frame> =
            (1..=8).map(|seq| Frame::new(SyntheticSource::frame_bytes(seq, FRAME_LEN))).collect();
        thread::spawn(move || {
            let mut i = 0;
            while running.load(Ordering::Relaxed) {
                publisher.publish(frames[i % frames.len()].clone());
                i += 1;
            }
        })
    };

    group.bench_function("under_publish", |b| b.iter(|| black_box(cache.read())));
    group.finish();

    running.store(false, Ordering::Relaxed);
    writer.join().expect("publisher thread");
}

fn bench_envelope(c: &mut Criterion) {
    let data = SyntheticSource::frame_bytes(1, FRAME_LEN);
    let encoded = envelope::encode(&data);

    let mut group = c.benchmark_group("envelope");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("encode", |b| b.iter(|| black_box(envelope::encode(black_box(&data)))));
    group.bench_function("decode", |b| {
        b.iter(|| black_box(envelope::decode(black_box(encoded.as_bytes()))))
    });
    group.finish();
}

fn bench_respond(c: &mut Criterion) {
    let (mut publisher, cache) = cache::channel();
    publisher.publish(Frame::new(SyntheticSource::frame_bytes(1, FRAME_LEN)));
    let endpoint = CaptureEndpoint::new(cache);

    let mut group = c.benchmark_group("respond");
    group.throughput(Throughput::Bytes(FRAME_LEN as u64));
    group.bench_function("get_capture", |b| {
        b.iter(|| black_box(endpoint.respond(&Method::GET, black_box("/capture"))))
    });
    group.bench_function("not_found", |b| {
        b.iter(|| black_box(endpoint.respond(&Method::GET, black_box("/other"))))
    });
    group.finish();
}

criterion_group!(benches, bench_cache_read, bench_envelope, bench_respond);
criterion_main!(benches);
