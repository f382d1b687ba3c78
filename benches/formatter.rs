//! Benchmarks for the record formatters and directory lookups.
//!
//! Isolates formatting from the async runtime so the per-record cost of the
//! line protocol and text output can be compared directly.

use chrono::{TimeZone, Utc};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use switchbot_listener::output::TextFormatter;
use switchbot_listener::{
    DeviceDirectory, InfluxDbFormatter, MetricKind, MetricRecord, OutputFormatter,
};

const ADDRESS: &str = "d3:a2:e1:f0:0b:4c";

fn record(kind: MetricKind, value: f32) -> MetricRecord {
    MetricRecord {
        time: Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap(),
        device_id: ADDRESS.to_string(),
        kind,
        value,
    }
}

fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_record");
    group.throughput(Throughput::Elements(1));

    let temperature = record(MetricKind::Temperature, -12.5);
    let influx = InfluxDbFormatter::new();
    group.bench_function("line_protocol", |b| {
        b.iter(|| black_box(influx.format(black_box(&temperature))))
    });
    group.bench_function("text", |b| {
        b.iter(|| black_box(TextFormatter.format(black_box(&temperature))))
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("directory_resolve");
    group.throughput(Throughput::Elements(1));

    let entries: Vec<(String, &str)> = (0..100u8)
        .map(|i| (format!("00:00:00:00:00:{i:02X}"), "Meter"))
        .chain([(ADDRESS.to_uppercase(), "Plug Mini (US)")])
        .collect();
    let directory = DeviceDirectory::from_entries(entries).unwrap();

    group.bench_function("hit_in_101", |b| {
        b.iter(|| black_box(directory.resolve(black_box(ADDRESS))))
    });
    group.bench_function("miss_in_101", |b| {
        b.iter(|| black_box(directory.resolve(black_box("11:22:33:44:55:66"))))
    });

    group.finish();
}

criterion_group!(benches, bench_format, bench_resolve);
criterion_main!(benches);
