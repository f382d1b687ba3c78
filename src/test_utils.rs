use crate::envelope::AdStructure;
use crate::mac_address::MacAddress;
use crate::record::{MetricKind, MetricRecord};
use chrono::{DateTime, TimeZone, Utc};

/// A stable device address for unit tests, in scanner (lower-case) form.
pub const TEST_ADDRESS: &str = "d3:a2:e1:f0:0b:4c";

/// The same device as [`TEST_ADDRESS`].
pub const TEST_MAC: MacAddress = MacAddress([0xD3, 0xA2, 0xE1, 0xF0, 0x0B, 0x4C]);

/// 2001-09-09T01:46:40Z, i.e. 10^9 seconds after the epoch.
pub fn test_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_000_000_000, 0).unwrap()
}

/// Build an `AdStructure` for [`TEST_ADDRESS`] at [`test_time`].
pub fn structure(ad_type: i64, data: &str) -> AdStructure {
    AdStructure {
        time: test_time(),
        device_address: TEST_ADDRESS.to_string(),
        ad_type,
        data: data.to_string(),
    }
}

pub fn metric(kind: MetricKind, value: f32) -> MetricRecord {
    MetricRecord {
        time: test_time(),
        device_id: TEST_ADDRESS.to_string(),
        kind,
        value,
    }
}

/// A scan line for [`TEST_ADDRESS`] carrying the given `(adtype, value)` pairs.
pub fn scan_line(structs: &[(i64, &str)]) -> String {
    let structs: Vec<serde_json::Value> = structs
        .iter()
        .map(|(ad_type, value)| {
            serde_json::json!({"adtype": ad_type, "desc": "", "value": value})
        })
        .collect();
    serde_json::json!({
        "time": "2001-09-09T01:46:40Z",
        "addr": TEST_ADDRESS,
        "structs": structs,
    })
    .to_string()
}
