//! Output formatters for decoded records.
//!
//! This module provides a trait for turning a [`MetricRecord`] into one line of
//! text, with an InfluxDB line protocol implementation (Telegraf `execd`
//! compatible) and a plain text one for reading on a terminal.

pub mod influxdb;

use crate::record::MetricRecord;
use chrono::SecondsFormat;

/// Trait for formatting records into output lines.
pub trait OutputFormatter: Send + Sync {
    /// Format a record as a single line, without the trailing newline.
    fn format(&self, record: &MetricRecord) -> String;
}

/// Human-readable `time device kind=value` lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format(&self, record: &MetricRecord) -> String {
        format!(
            "{} {} {}={}",
            record.time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            record.device_id,
            record.kind,
            record.value
        )
    }
}
