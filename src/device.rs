//! SwitchBot device classes known to the extractor.

use crate::record::MetricKind;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Placeholder type name for addresses the directory does not know about.
pub const UNKNOWN_DEVICE_TYPE: &str = "_unknown_";

/// Device class resolved from the device directory.
///
/// Decoding is dispatched on this enum, so adding a class that carries
/// telemetry means adding a match arm in [`crate::extract::extract`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Thermo-hygrometer ("Meter")
    Meter,
    /// Smart plug, US model ("Plug Mini (US)")
    PlugMiniUs,
    /// Smart plug, JP model ("Plug Mini (JP)"), same broadcast layout as the US model
    PlugMiniJp,
    /// Hub Mini; its broadcasts carry nothing worth recording
    HubMini,
    /// Motion sensor; broadcast format not decoded yet
    MotionSensor,
    /// Any other type name reported by SwitchBot
    Other(String),
    /// Address not present in the device directory
    Unknown,
}

impl DeviceClass {
    /// SwitchBot's name for this device type.
    pub fn type_name(&self) -> &str {
        match self {
            DeviceClass::Meter => "Meter",
            DeviceClass::PlugMiniUs => "Plug Mini (US)",
            DeviceClass::PlugMiniJp => "Plug Mini (JP)",
            DeviceClass::HubMini => "Hub Mini",
            DeviceClass::MotionSensor => "Motion Sensor",
            DeviceClass::Other(name) => name,
            DeviceClass::Unknown => UNKNOWN_DEVICE_TYPE,
        }
    }

    /// Metric kinds a device of this class can produce.
    pub fn metric_kinds(&self) -> &'static [MetricKind] {
        match self {
            DeviceClass::Meter => &[
                MetricKind::Battery,
                MetricKind::Temperature,
                MetricKind::Humidity,
            ],
            DeviceClass::PlugMiniUs | DeviceClass::PlugMiniJp => {
                &[MetricKind::PowerOn, MetricKind::Load]
            }
            DeviceClass::HubMini
            | DeviceClass::MotionSensor
            | DeviceClass::Other(_)
            | DeviceClass::Unknown => &[],
        }
    }
}

impl FromStr for DeviceClass {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "Meter" => DeviceClass::Meter,
            "Plug Mini (US)" => DeviceClass::PlugMiniUs,
            "Plug Mini (JP)" => DeviceClass::PlugMiniJp,
            "Hub Mini" => DeviceClass::HubMini,
            "Motion Sensor" => DeviceClass::MotionSensor,
            "" | UNKNOWN_DEVICE_TYPE => DeviceClass::Unknown,
            other => DeviceClass::Other(other.to_string()),
        })
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_type_names() {
        let cases = [
            ("Meter", DeviceClass::Meter),
            ("Plug Mini (US)", DeviceClass::PlugMiniUs),
            ("Plug Mini (JP)", DeviceClass::PlugMiniJp),
            ("Hub Mini", DeviceClass::HubMini),
            ("Motion Sensor", DeviceClass::MotionSensor),
            ("_unknown_", DeviceClass::Unknown),
        ];
        for (name, class) in cases {
            assert_eq!(name.parse::<DeviceClass>().unwrap(), class);
            assert_eq!(class.type_name(), name);
        }
    }

    #[test]
    fn test_parse_other_type_name() {
        let class: DeviceClass = "Ceiling Light".parse().unwrap();
        assert_eq!(class, DeviceClass::Other("Ceiling Light".to_string()));
        assert_eq!(class.to_string(), "Ceiling Light");
    }

    #[test]
    fn test_metric_kinds() {
        assert_eq!(DeviceClass::Meter.metric_kinds().len(), 3);
        assert_eq!(
            DeviceClass::PlugMiniJp.metric_kinds(),
            DeviceClass::PlugMiniUs.metric_kinds()
        );
        assert!(DeviceClass::Unknown.metric_kinds().is_empty());
        assert!(DeviceClass::MotionSensor.metric_kinds().is_empty());
    }
}
