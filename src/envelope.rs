//! Inbound scan envelopes.
//!
//! The scanner emits one JSON object per advertisement event:
//!
//! ```text
//! {"time":"2024-01-02T03:04:05.123456789+09:00","addr":"d3:a2:e1:f0:0b:4c",
//!  "structs":[{"adtype":22,"desc":"16b Service Data","value":"000d540064009b4c"}]}
//! ```
//!
//! Each element of `structs` becomes one [`AdStructure`]. The `desc` field is a
//! fixed description of the AD type and is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors for a line that is not a usable envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid envelope time '{value}': {source}")]
    Time {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One advertising-data element of a scan event, payload still hex-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct AdStructure {
    pub time: DateTime<Utc>,
    pub device_address: String,
    pub ad_type: i64,
    pub data: String,
}

#[derive(Deserialize)]
struct Signal {
    time: String,
    addr: String,
    #[serde(default)]
    structs: Vec<SignalStruct>,
}

#[derive(Deserialize)]
struct SignalStruct {
    adtype: i64,
    value: String,
}

/// Split one envelope line into its advertisement structures.
///
/// The event time is normalized to UTC and shared by every structure.
pub fn parse_signal(line: &str) -> Result<Vec<AdStructure>, EnvelopeError> {
    let signal: Signal = serde_json::from_str(line)?;

    let time = DateTime::parse_from_rfc3339(&signal.time)
        .map_err(|source| EnvelopeError::Time {
            value: signal.time.clone(),
            source,
        })?
        .with_timezone(&Utc);

    Ok(signal
        .structs
        .into_iter()
        .map(|s| AdStructure {
            time,
            device_address: signal.addr.clone(),
            ad_type: s.adtype,
            data: s.value,
        })
        .collect())
}
