//! Record extraction from SwitchBot advertisement payloads.
//!
//! Each device class broadcasts its telemetry in exactly one AD type channel.
//! Structures of any other AD type are part of the same scan event but carry
//! nothing for that class, so they produce no records and no error.
//!
//! Layouts follow the SwitchBot BLE documentation:
//! <https://github.com/OpenWonderLabs/SwitchBotAPI-BLE/blob/latest/devicetypes/meter.md>
//! <https://github.com/OpenWonderLabs/SwitchBotAPI-BLE/blob/latest/devicetypes/plugmini.md>

use crate::device::DeviceClass;
use crate::envelope::AdStructure;
use crate::record::{MetricKind, MetricRecord};
use thiserror::Error;

/// AD type 0x16, "Service Data - 16-bit UUID"
pub const AD_TYPE_SERVICE_DATA: i64 = 22;

/// AD type 0xFF, "Manufacturer Specific Data"
pub const AD_TYPE_MANUFACTURER_DATA: i64 = 255;

const METER_PAYLOAD_LEN: usize = 8;
const PLUG_PAYLOAD_LEN: usize = 14;

const PLUG_POWER_ON: u8 = 0x80;

/// Payload errors for a structure whose device class and AD type matched a rule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("payload is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
}

/// Errors returned by [`extract`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// The directory knows the device, but no decode rule exists for its class.
    #[error("unimplemented device type: {class}, addr: {address}")]
    Unimplemented { class: DeviceClass, address: String },
    #[error("failed to decode {address} (adtype {ad_type}): {source}")]
    Decode {
        address: String,
        ad_type: i64,
        #[source]
        source: DecodeError,
    },
}

/// Convenience alias for extraction results.
pub type ExtractResult = Result<Vec<MetricRecord>, ExtractError>;

/// Decode one advertisement structure for a device of the given class.
///
/// Unknown devices are expected scan noise and yield nothing.
pub fn extract(structure: &AdStructure, class: &DeviceClass) -> ExtractResult {
    let decoded = match class {
        DeviceClass::Meter => decode_meter(structure),
        DeviceClass::PlugMiniUs | DeviceClass::PlugMiniJp => decode_plug_mini(structure),
        DeviceClass::HubMini | DeviceClass::Unknown => return Ok(Vec::new()),
        DeviceClass::MotionSensor | DeviceClass::Other(_) => {
            return Err(ExtractError::Unimplemented {
                class: class.clone(),
                address: structure.device_address.clone(),
            });
        }
    };

    decoded.map_err(|source| ExtractError::Decode {
        address: structure.device_address.clone(),
        ad_type: structure.ad_type,
        source,
    })
}

fn payload(data: &str, needed: usize) -> Result<Vec<u8>, DecodeError> {
    let bytes = hex::decode(data)?;
    if bytes.len() < needed {
        return Err(DecodeError::TooShort {
            needed,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

fn record(s: &AdStructure, kind: MetricKind, value: f32) -> MetricRecord {
    MetricRecord {
        time: s.time,
        device_id: s.device_address.clone(),
        kind,
        value,
    }
}

/// Meter: battery, temperature and humidity from service data.
///
/// Byte indices are two higher than the datasheet's numbering. The documented
/// table covers only 6 of the 8 service-data bytes; the offset was found against
/// real captures.
fn decode_meter(s: &AdStructure) -> Result<Vec<MetricRecord>, DecodeError> {
    if s.ad_type != AD_TYPE_SERVICE_DATA {
        return Ok(Vec::new());
    }

    let bytes = payload(&s.data, METER_PAYLOAD_LEN)?;

    let battery = bytes[4] & 0x7f;

    // Bit 7 of byte 6 set means above zero. Older decoders disagree on this
    // polarity; it has only been checked against captures at positive temperatures.
    let is_negative = bytes[6] & 0x80 == 0;
    let integer = u32::from(bytes[6] & 0x7f);
    let tenths = u32::from(bytes[5] & 0x0f);
    let magnitude = integer as f32 + tenths as f32 / 10.0;
    let temperature = if is_negative { -magnitude } else { magnitude };

    let humidity = bytes[7] & 0x7f;

    Ok(vec![
        record(s, MetricKind::Battery, f32::from(battery)),
        record(s, MetricKind::Temperature, temperature),
        record(s, MetricKind::Humidity, f32::from(humidity)),
    ])
}

/// Plug Mini: relay state and load from manufacturer data.
fn decode_plug_mini(s: &AdStructure) -> Result<Vec<MetricRecord>, DecodeError> {
    if s.ad_type != AD_TYPE_MANUFACTURER_DATA {
        return Ok(Vec::new());
    }

    let bytes = payload(&s.data, PLUG_PAYLOAD_LEN)?;

    let power_on = if bytes[9] == PLUG_POWER_ON { 1.0 } else { 0.0 };

    // The vendor combines the two bytes with 255, not 256.
    let msb = u32::from(bytes[12] & 0x7f);
    let lsb = u32::from(bytes[13]);
    let load = (msb * 255 + lsb) as f32 / 10.0;

    Ok(vec![
        record(s, MetricKind::PowerOn, power_on),
        record(s, MetricKind::Load, load),
    ])
}
