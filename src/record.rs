//! Decoded telemetry records.

use chrono::{DateTime, Utc};
use std::fmt;

/// The kind of value a [`MetricRecord`] carries.
///
/// The display name doubles as the InfluxDB measurement name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MetricKind {
    /// Battery level in percent (0-100)
    Battery,
    /// Temperature in Celsius
    Temperature,
    /// Relative humidity in percent (0-100)
    Humidity,
    /// 1.0 when the plug relay is on, 0.0 otherwise
    PowerOn,
    /// Power draw in watts
    Load,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Battery => "Battery",
            MetricKind::Temperature => "Temperature",
            MetricKind::Humidity => "Humidity",
            MetricKind::PowerOn => "PowerOn",
            MetricKind::Load => "Load",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One telemetry sample decoded from a single advertisement structure.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// Time of the advertisement event the sample came from
    pub time: DateTime<Utc>,
    /// Address of the broadcasting device, as it appeared in the scan
    pub device_id: String,
    pub kind: MetricKind,
    pub value: f32,
}
