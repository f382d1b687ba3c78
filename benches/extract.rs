//! Benchmarks for the decode path: envelope parsing, extraction, and the
//! whole line through the recorder.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use switchbot_listener::sink::{SinkError, SinkFuture};
use switchbot_listener::{
    DeviceClass, DeviceDirectory, MetricRecord, Recorder, Sink, extract, parse_signal,
};
use tokio::runtime::Runtime;

const ADDRESS: &str = "d3:a2:e1:f0:0b:4c";
const METER_PAYLOAD: &str = "000d540064009b4c";
const PLUG_PAYLOAD: &str = "69096055f93599ff048010260a8f";

fn scan_line(structs: usize) -> String {
    let mut elements = vec![
        r#"{"adtype":1,"desc":"Flags","value":"06"}"#.to_string(),
    ];
    elements.extend(
        (0..structs).map(|_| format!(r#"{{"adtype":22,"desc":"16b Service Data","value":"{METER_PAYLOAD}"}}"#)),
    );
    format!(
        r#"{{"time":"2024-01-02T03:04:05.123456789+09:00","addr":"{ADDRESS}","structs":[{}]}}"#,
        elements.join(",")
    )
}

/// Discards everything, so the benchmark measures decoding only.
struct NullSink;

impl Sink for NullSink {
    fn record<'a>(&'a mut self, records: &'a [MetricRecord]) -> SinkFuture<'a> {
        black_box(records);
        Box::pin(async { Ok::<(), SinkError>(()) })
    }
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    group.throughput(Throughput::Elements(1));

    let meter = parse_signal(&scan_line(1)).unwrap().pop().unwrap();
    group.bench_function("meter", |b| {
        b.iter(|| black_box(extract(black_box(&meter), &DeviceClass::Meter)))
    });

    let mut plug = meter.clone();
    plug.ad_type = 255;
    plug.data = PLUG_PAYLOAD.to_string();
    group.bench_function("plug_mini", |b| {
        b.iter(|| black_box(extract(black_box(&plug), &DeviceClass::PlugMiniUs)))
    });

    group.bench_function("filtered_ad_type", |b| {
        b.iter(|| black_box(extract(black_box(&plug), &DeviceClass::Meter)))
    });

    group.finish();
}

fn bench_parse_signal(c: &mut Criterion) {
    let line = scan_line(1);
    c.bench_function("parse_signal", |b| {
        b.iter(|| black_box(parse_signal(black_box(&line))))
    });
}

fn bench_recorder(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let directory = Arc::new(DeviceDirectory::from_entries([(ADDRESS, "Meter")]).unwrap());
    let mut group = c.benchmark_group("recorder_line");

    for structs in [1usize, 8] {
        let line = scan_line(structs);
        group.throughput(Throughput::Elements(structs as u64));
        for parallel in [false, true] {
            let id = BenchmarkId::new(if parallel { "parallel" } else { "sequential" }, structs);
            group.bench_with_input(id, &line, |b, line| {
                let mut recorder =
                    Recorder::new(Arc::clone(&directory), Box::new(NullSink)).parallel_decode(parallel);
                b.iter(|| rt.block_on(recorder.handle_line(black_box(line))))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_parse_signal, bench_recorder);
criterion_main!(benches);
