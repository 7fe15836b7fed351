//! Benchmarks for the frame codec
//!
//! Covers the per-frame work done on every broadcast:
//! - checksum over a full status frame
//! - one-shot decode of a captured frame
//! - streaming decode of a burst with interleaved noise

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use spa_rs485::protocol::{crc8, decode, FrameCodec};
use std::hint::black_box;
use tokio_util::codec::Decoder;

const SUNDANCE_STATUS: &str =
    "7E26FFAFC4AEA7AAABA4A1C95DA5A1C2A19CBDCEBBE2B9BBADB4B5A7B7DFB1B29BD38D8E8F88F97E";

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn bench_checksum(c: &mut Criterion) {
    let frame = hex(SUNDANCE_STATUS);
    let region = &frame[1..frame.len() - 2];

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(region.len() as u64));
    group.bench_function("crc8_status", |b| b.iter(|| crc8(black_box(region))));
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let frame = hex(SUNDANCE_STATUS);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("single_frame", |b| b.iter(|| decode(black_box(&frame))));
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let frame = hex(SUNDANCE_STATUS);
    let mut burst = Vec::new();
    for i in 0..64u8 {
        burst.extend_from_slice(&frame);
        // a stray byte between every few frames forces resynchronisation
        if i % 4 == 0 {
            burst.push(0x00);
        }
    }

    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(burst.len() as u64));
    group.bench_function("burst_with_noise", |b| {
        b.iter(|| {
            let mut codec = FrameCodec::new();
            let mut buf = BytesMut::from(&burst[..]);
            let mut frames = 0;
            while let Ok(Some(frame)) = codec.decode(&mut buf) {
                black_box(frame);
                frames += 1;
            }
            frames
        })
    });
    group.finish();
}

criterion_group!(benches, bench_checksum, bench_decode, bench_stream);
criterion_main!(benches);
