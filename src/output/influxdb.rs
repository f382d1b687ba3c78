//! InfluxDB line protocol output formatter.
//!
//! Every record becomes one point: the metric kind is the measurement, the
//! device address the `DeviceId` tag and the sample the `value` field.

use crate::output::OutputFormatter;
use crate::record::MetricRecord;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Tag key carrying the device address.
pub const DEVICE_TAG: &str = "DeviceId";

/// Field key carrying the sample value.
pub const VALUE_FIELD: &str = "value";

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<String, String>,
    pub field_set: BTreeMap<String, f32>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Escape commas, spaces and equals signs in keys and tag values.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn fmt_tags(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (key, value) in data_point.tag_set.iter() {
        write!(fmt, ",{}={}", escape(key), escape(value))?;
    }
    Ok(())
}

fn fmt_fields(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    let mut first = true;
    for (key, value) in data_point.field_set.iter() {
        if first {
            first = false;
        } else {
            write!(fmt, ",")?;
        }
        write!(fmt, "{}={}", escape(key), value)?;
    }
    Ok(())
}

fn fmt_timestamp(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    // Times past 2262 do not fit in i64 nanoseconds; let the server stamp those.
    if let Some(nanos) = data_point.timestamp.and_then(|t| t.timestamp_nanos_opt()) {
        write!(fmt, " {}", nanos)?;
    }
    Ok(())
}

impl fmt::Display for DataPoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", escape(&self.measurement))?;
        fmt_tags(self, fmt)?;
        write!(fmt, " ")?;
        fmt_fields(self, fmt)?;
        fmt_timestamp(self, fmt)
    }
}

/// InfluxDB line protocol formatter.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfluxDbFormatter;

impl InfluxDbFormatter {
    pub fn new() -> Self {
        Self
    }

    fn to_data_point(&self, record: &MetricRecord) -> DataPoint {
        let mut tag_set = BTreeMap::new();
        tag_set.insert(DEVICE_TAG.to_string(), record.device_id.clone());

        let mut field_set = BTreeMap::new();
        field_set.insert(VALUE_FIELD.to_string(), record.value);

        DataPoint {
            measurement: record.kind.to_string(),
            tag_set,
            field_set,
            timestamp: Some(record.time),
        }
    }
}

impl OutputFormatter for InfluxDbFormatter {
    fn format(&self, record: &MetricRecord) -> String {
        format!("{}", self.to_data_point(record))
    }
}
